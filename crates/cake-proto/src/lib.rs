//! # cake-proto
//!
//! Shared types for the Cake test tool: assertion specs and results,
//! scenario/step definitions, run results, the cross-context bridge
//! message protocol, and the selector-quality interface.
//!
//! Every type here is plain serde-serializable data. Behavior (the
//! evaluator, the runner, the bridge) lives in `cake-core` and
//! `cake-bridge`; both contexts of the bridge exchange exactly the
//! wire shapes defined in [`message`].

pub mod assertion;
pub mod message;
pub mod quality;
pub mod scenario;

pub use assertion::{AssertionKind, AssertionResult, AssertionSpec, SpecError, SpecValue};
pub use message::{RuntimeRequest, RuntimeResponse};
pub use quality::{SelectorQuality, SelectorStrategy};
pub use scenario::{
    EXPORT_VERSION, RunStatus, ScenarioExport, ScenarioStatus, StepAction, StepResult, StepStatus,
    TargetLocator, TestRunResult, TestScenario, TestStep,
};

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// All persisted timestamps use this representation.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
