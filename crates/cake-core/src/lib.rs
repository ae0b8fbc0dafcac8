//! # cake-core
//!
//! The execution core of Cake: assertion evaluation with
//! timeout/retry polling, the scenario runner with cooperative
//! cancellation, durable scenario storage, and the page-access
//! capability the whole stack is tested through.
//!
//! ```text
//! TestRunner ──▶ PageDriver ──▶ PageAccessor (page document)
//!      │              │
//!      │              └─▶ AssertionEngine ──▶ evaluator
//!      └─▶ ScenarioStore / RunHistory
//! ```
//!
//! The bridge crate (`cake-bridge`) supplies a [`PageDriver`] that
//! crosses the isolated-context boundary; [`LocalDriver`] runs
//! in-process against any [`PageAccessor`].

pub mod analyzer;
pub mod driver;
pub mod engine;
pub mod evaluator;
pub mod history;
pub mod memory_page;
pub mod page;
pub mod runner;
pub mod selector;
pub mod store;

pub use analyzer::{DefaultQualityScorer, QualityScorer};
pub use driver::{DriverError, LocalDriver, PageDriver};
pub use engine::AssertionEngine;
pub use evaluator::{EvalError, Evaluation, evaluate};
pub use history::RunHistory;
pub use memory_page::{ClickEffect, MemoryPage, NodeSpec};
pub use page::{PageAccessor, PageElement, PageError};
pub use runner::{ProgressCallback, RunnerError, TestRunner};
pub use selector::Selector;
pub use store::{
    FileScenarioStore, MemoryScenarioStore, NewScenario, PreferredSelector, ScenarioPatch,
    ScenarioStore, Settings, SettingsPatch, StorageData, StoreError,
};

/// Library version, matching the crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
