//! Scenarios, steps, and run results.
//!
//! A [`TestScenario`] owns an ordered list of [`TestStep`]s; step order
//! is execution order. Running a scenario produces one [`StepResult`]
//! per executed step and a [`TestRunResult`] aggregate.

use crate::assertion::{AssertionResult, AssertionSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version tag written into [`ScenarioExport`] envelopes.
pub const EXPORT_VERSION: &str = "1.0";

/// Identifies the DOM target of a click/input/assert step.
///
/// `role` and `name` are display metadata captured at pick time; only
/// `selector` participates in element resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetLocator {
    /// CSS selector resolving the target.
    pub selector: String,

    /// Accessibility role shown in the UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Accessible name shown in the UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TargetLocator {
    /// A locator carrying only a CSS selector.
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            role: None,
            name: None,
        }
    }
}

/// The action payload of a step, discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Click the first element matching the target.
    Click { target: TargetLocator },

    /// Set the value of the first element matching the target.
    Input { target: TargetLocator, value: String },

    /// Evaluate an assertion against the target.
    Assert {
        target: TargetLocator,
        assertion: AssertionSpec,
    },

    /// Navigate to a URL. Recorded in scenarios but not executable by
    /// the panel runner, which skips it.
    Navigate { url: String },

    /// Sleep for a fixed duration.
    Wait { duration_ms: u64 },
}

impl StepAction {
    /// The wire name of the action variant.
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Click { .. } => "click",
            StepAction::Input { .. } => "input",
            StepAction::Assert { .. } => "assert",
            StepAction::Navigate { .. } => "navigate",
            StepAction::Wait { .. } => "wait",
        }
    }

    /// The step's target locator, for the variants that have one.
    pub fn target(&self) -> Option<&TargetLocator> {
        match self {
            StepAction::Click { target }
            | StepAction::Input { target, .. }
            | StepAction::Assert { target, .. } => Some(target),
            StepAction::Navigate { .. } | StepAction::Wait { .. } => None,
        }
    }
}

/// One step of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    /// Unique, stable step id.
    pub id: String,

    /// When the step was recorded, millis since epoch.
    pub timestamp_ms: i64,

    /// What the step does.
    #[serde(flatten)]
    pub action: StepAction,
}

/// Lifecycle status of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    #[default]
    Draft,
    Ready,
    Running,
    Passed,
    Failed,
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScenarioStatus::Draft => "draft",
            ScenarioStatus::Ready => "ready",
            ScenarioStatus::Running => "running",
            ScenarioStatus::Passed => "passed",
            ScenarioStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A named, ordered collection of steps representing one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestScenario {
    /// Unique scenario id.
    pub id: String,

    /// User-facing name.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<TestStep>,

    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Current lifecycle status.
    #[serde(default)]
    pub status: ScenarioStatus,

    /// Creation time, millis since epoch.
    pub created_at_ms: i64,

    /// Last mutation time, millis since epoch.
    pub updated_at_ms: i64,

    /// Completion time of the most recent run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<i64>,

    /// How many runs have completed.
    #[serde(default)]
    pub run_count: u32,

    /// Assertion results from the most recent run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_results: Vec<AssertionResult>,
}

/// Outcome of a single executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    /// The runner does not know how to execute this step type. Skipped
    /// steps count as neither passed nor failed but stay in the result
    /// list for visibility.
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Passed => "passed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Terminal status of one scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl RunStatus {
    /// The scenario status a finished run leaves behind.
    ///
    /// A cancelled run represents no verdict, so the scenario reverts
    /// to draft instead of keeping a stale pass/fail.
    pub fn as_scenario_status(&self) -> ScenarioStatus {
        match self {
            RunStatus::Passed => ScenarioStatus::Passed,
            RunStatus::Failed => ScenarioStatus::Failed,
            RunStatus::Cancelled => ScenarioStatus::Draft,
        }
    }
}

/// Result of one executed step, appended in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Id of the executed step.
    pub step_id: String,

    /// Wire name of the step's action (`click`, `assert`, ...).
    pub step_type: String,

    /// Outcome.
    pub status: StepStatus,

    /// Execution time in milliseconds.
    pub duration_ms: u64,

    /// Failure or skip explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The assertion result, for assert steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<AssertionResult>,
}

/// Aggregated outcome of one scenario run.
///
/// Built incrementally by the runner and returned (and persisted to
/// history) atomically at the end or at the cancellation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    /// The scenario that ran.
    pub scenario_id: String,

    /// Terminal run status.
    pub status: RunStatus,

    /// Run start, millis since epoch.
    pub started_at_ms: i64,

    /// Run end, millis since epoch.
    pub ended_at_ms: i64,

    /// Total run duration in milliseconds.
    pub duration_ms: u64,

    /// Per-step results in execution order.
    pub step_results: Vec<StepResult>,

    /// Number of steps in the scenario (including unexecuted ones on
    /// cancellation).
    pub total_steps: usize,

    /// Steps that passed.
    pub passed_steps: usize,

    /// Steps that failed.
    pub failed_steps: usize,

    /// All assertion results produced during the run.
    pub assertion_results: Vec<AssertionResult>,
}

impl TestRunResult {
    /// Steps that were skipped.
    pub fn skipped_steps(&self) -> usize {
        self.step_results
            .iter()
            .filter(|r| r.status == StepStatus::Skipped)
            .count()
    }

    /// True if the run passed outright.
    pub fn all_passed(&self) -> bool {
        self.status == RunStatus::Passed
    }
}

/// Envelope for exported scenarios.
///
/// Import always re-assigns fresh ids and timestamps, so an export can
/// be re-imported into the same store without colliding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioExport {
    /// The exported scenarios.
    pub scenarios: Vec<TestScenario>,

    /// Export time, millis since epoch.
    pub exported_at_ms: i64,

    /// Format version, currently [`EXPORT_VERSION`].
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::AssertionKind;

    fn step(id: &str, action: StepAction) -> TestStep {
        TestStep {
            id: id.to_string(),
            timestamp_ms: 1_700_000_000_000,
            action,
        }
    }

    #[test]
    fn test_step_action_wire_tag() {
        let s = step(
            "s1",
            StepAction::Click {
                target: TargetLocator::css("#login-btn"),
            },
        );
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["type"], "click");
        assert_eq!(value["target"]["selector"], "#login-btn");
        assert_eq!(value["id"], "s1");
    }

    #[test]
    fn test_step_roundtrip_all_variants() {
        let steps = vec![
            step(
                "a",
                StepAction::Click {
                    target: TargetLocator::css("#a"),
                },
            ),
            step(
                "b",
                StepAction::Input {
                    target: TargetLocator::css("#b"),
                    value: "user@example.com".into(),
                },
            ),
            step(
                "c",
                StepAction::Assert {
                    target: TargetLocator::css("#c"),
                    assertion: AssertionSpec::new(AssertionKind::TextEquals, "Welcome"),
                },
            ),
            step(
                "d",
                StepAction::Navigate {
                    url: "https://example.com".into(),
                },
            ),
            step("e", StepAction::Wait { duration_ms: 250 }),
        ];
        for s in steps {
            let json = serde_json::to_string(&s).unwrap();
            let back: TestStep = serde_json::from_str(&json).unwrap();
            assert_eq!(s, back);
        }
    }

    #[test]
    fn test_scenario_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ScenarioStatus::Draft).unwrap(),
            "\"draft\""
        );
        assert_eq!(
            serde_json::from_str::<ScenarioStatus>("\"running\"").unwrap(),
            ScenarioStatus::Running
        );
    }

    #[test]
    fn test_run_status_maps_to_scenario_status() {
        assert_eq!(
            RunStatus::Passed.as_scenario_status(),
            ScenarioStatus::Passed
        );
        assert_eq!(
            RunStatus::Failed.as_scenario_status(),
            ScenarioStatus::Failed
        );
        assert_eq!(
            RunStatus::Cancelled.as_scenario_status(),
            ScenarioStatus::Draft
        );
    }

    #[test]
    fn test_action_target() {
        let click = StepAction::Click {
            target: TargetLocator::css("#x"),
        };
        assert_eq!(click.target().unwrap().selector, "#x");
        assert!(StepAction::Wait { duration_ms: 1 }.target().is_none());
    }

    #[test]
    fn test_export_envelope_shape() {
        let export = ScenarioExport {
            scenarios: vec![],
            exported_at_ms: 1_700_000_000_000,
            version: EXPORT_VERSION.to_string(),
        };
        let value = serde_json::to_value(&export).unwrap();
        assert_eq!(value["version"], "1.0");
        assert!(value["scenarios"].as_array().unwrap().is_empty());
        assert_eq!(value["exportedAtMs"], 1_700_000_000_000_i64);
    }
}
