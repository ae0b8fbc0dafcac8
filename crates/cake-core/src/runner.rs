//! Scenario execution.
//!
//! [`TestRunner`] sequences a scenario's steps through a
//! [`PageDriver`], aggregates per-step results, and writes the
//! terminal status / run-count / last-run update back to the store in
//! one atomic call.
//!
//! Execution is single-flighted per runner: starting a new run while
//! one is active cancels the previous run (most recent intent wins)
//! rather than rejecting the request. Cancellation is cooperative —
//! the in-flight run observes the flag at step boundaries only, so a
//! step already dispatched always finishes and keeps its result.
//!
//! Step failures never abort the run. A broken assertion or a missing
//! click target is recorded and the loop continues, so one failure
//! cannot hide downstream regressions in the same scenario.

use crate::driver::PageDriver;
use crate::history::RunHistory;
use crate::store::{ScenarioStore, StoreError};
use cake_proto::{
    RunStatus, ScenarioStatus, StepAction, StepResult, StepStatus, TestRunResult, TestStep, now_ms,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors that escape [`TestRunner::run_scenario`].
///
/// Step-level failures never appear here; they live in the returned
/// [`TestRunResult`]. Only a missing scenario or storage I/O escalates
/// to the caller.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// No scenario with the given id.
    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),

    /// The scenario store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Callback invoked before each step: `(step_number, total, step)`.
pub type ProgressCallback = Box<dyn Fn(usize, usize, &TestStep) + Send + Sync>;

struct RunHandle {
    cancelled: Arc<AtomicBool>,
}

/// Executes scenarios against a page driver.
///
/// Explicitly constructed and dependency-injected; a process may hold
/// one runner per page it drives, and tests inject fake stores and
/// drivers.
pub struct TestRunner {
    store: Arc<dyn ScenarioStore>,
    driver: Arc<dyn PageDriver>,
    history: Option<RunHistory>,
    current: Mutex<Option<RunHandle>>,
    on_progress: Option<ProgressCallback>,
}

impl TestRunner {
    /// Creates a runner over the given store and driver.
    pub fn new(store: Arc<dyn ScenarioStore>, driver: Arc<dyn PageDriver>) -> Self {
        Self {
            store,
            driver,
            history: None,
            current: Mutex::new(None),
            on_progress: None,
        }
    }

    /// Also appends every finished run to the given history.
    pub fn with_history(mut self, history: RunHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Sets a callback invoked before each step executes.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Requests cancellation of the active run, if any.
    ///
    /// Cooperative: the run halts at the next step boundary and
    /// reports [`RunStatus::Cancelled`].
    pub async fn cancel(&self) {
        if let Some(handle) = self.current.lock().await.as_ref() {
            handle.cancelled.store(true, Ordering::SeqCst);
        }
    }

    /// Runs a scenario to completion and returns the aggregate result.
    ///
    /// The caller owns the returned result; the runner only writes a
    /// summary (status, run count, last-run time, latest assertion
    /// results) back into the scenario.
    pub async fn run_scenario(&self, scenario_id: &str) -> Result<TestRunResult, RunnerError> {
        let cancelled = self.begin_run().await;
        let outcome = self.run_inner(scenario_id, &cancelled).await;
        self.finish_run(&cancelled).await;
        outcome
    }

    /// Installs a fresh cancellation flag, cancelling any previous run.
    async fn begin_run(&self) -> Arc<AtomicBool> {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.as_ref() {
            debug!("new run requested; cancelling active run");
            previous.cancelled.store(true, Ordering::SeqCst);
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        *current = Some(RunHandle {
            cancelled: Arc::clone(&cancelled),
        });
        cancelled
    }

    /// Clears the active-run handle, unless a newer run replaced it.
    async fn finish_run(&self, cancelled: &Arc<AtomicBool>) {
        let mut current = self.current.lock().await;
        if let Some(handle) = current.as_ref()
            && Arc::ptr_eq(&handle.cancelled, cancelled)
        {
            *current = None;
        }
    }

    async fn run_inner(
        &self,
        scenario_id: &str,
        cancelled: &AtomicBool,
    ) -> Result<TestRunResult, RunnerError> {
        let started_at_ms = now_ms();
        let start = Instant::now();

        let scenario = self
            .store
            .get_scenario(scenario_id)
            .await?
            .ok_or_else(|| RunnerError::ScenarioNotFound(scenario_id.to_string()))?;

        self.store
            .update_scenario_status(scenario_id, ScenarioStatus::Running)
            .await?;

        info!(
            scenario = scenario_id,
            steps = scenario.steps.len(),
            "run started"
        );

        let total_steps = scenario.steps.len();
        let mut step_results: Vec<StepResult> = Vec::with_capacity(total_steps);
        let mut assertion_results = Vec::new();
        let mut passed_steps = 0usize;
        let mut failed_steps = 0usize;
        let mut was_cancelled = false;

        for (index, step) in scenario.steps.iter().enumerate() {
            if cancelled.load(Ordering::SeqCst) {
                info!(scenario = scenario_id, at_step = index, "run cancelled");
                was_cancelled = true;
                break;
            }

            if let Some(callback) = &self.on_progress {
                callback(index + 1, total_steps, step);
            }

            let result = self.execute_step(step).await;
            debug!(step = %step.id, status = %result.status, "step finished");

            match result.status {
                StepStatus::Passed => passed_steps += 1,
                StepStatus::Failed => failed_steps += 1,
                StepStatus::Skipped => {}
            }
            if let Some(assertion) = &result.assertion {
                assertion_results.push(assertion.clone());
            }
            step_results.push(result);
        }

        // Cancellation overrides any partial failure; otherwise a
        // single failed step fails the run.
        let status = if was_cancelled {
            RunStatus::Cancelled
        } else if failed_steps > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Passed
        };

        let ended_at_ms = now_ms();
        let run = TestRunResult {
            scenario_id: scenario_id.to_string(),
            status,
            started_at_ms,
            ended_at_ms,
            duration_ms: start.elapsed().as_millis() as u64,
            step_results,
            total_steps,
            passed_steps,
            failed_steps,
            assertion_results,
        };

        // Terminal persistence must not leave the scenario stuck at
        // Running: when the atomic update fails, fall back to a plain
        // Failed status write before surfacing the error.
        if let Err(err) = self
            .store
            .complete_run(scenario_id, status, run.assertion_results.clone())
            .await
        {
            warn!(scenario = scenario_id, %err, "failed to record run; forcing failed status");
            if let Err(fallback) = self
                .store
                .update_scenario_status(scenario_id, ScenarioStatus::Failed)
                .await
            {
                warn!(scenario = scenario_id, %fallback, "status fallback also failed");
            }
            return Err(err.into());
        }

        if let Some(history) = &self.history
            && let Err(err) = history.append(&run)
        {
            warn!(scenario = scenario_id, %err, "failed to append run history");
        }

        info!(
            scenario = scenario_id,
            status = %status,
            passed = passed_steps,
            failed = failed_steps,
            "run finished"
        );
        Ok(run)
    }

    /// Executes one step; never fails.
    ///
    /// Unrecognized step types come back as `Skipped` with an
    /// explanation rather than aborting the run.
    async fn execute_step(&self, step: &TestStep) -> StepResult {
        let start = Instant::now();
        let (status, error, assertion) = match &step.action {
            StepAction::Click { target } => {
                match self.driver.click_element(&target.selector).await {
                    Ok(()) => (StepStatus::Passed, None, None),
                    Err(err) => (StepStatus::Failed, Some(err.to_string()), None),
                }
            }
            StepAction::Input { target, value } => {
                match self.driver.input_element(&target.selector, value).await {
                    Ok(()) => (StepStatus::Passed, None, None),
                    Err(err) => (StepStatus::Failed, Some(err.to_string()), None),
                }
            }
            StepAction::Wait { duration_ms } => {
                tokio::time::sleep(Duration::from_millis(*duration_ms)).await;
                (StepStatus::Passed, None, None)
            }
            StepAction::Assert { target, assertion } => {
                match self.driver.assert_element(&target.selector, assertion).await {
                    Ok(result) => {
                        let status = if result.success {
                            StepStatus::Passed
                        } else {
                            StepStatus::Failed
                        };
                        let error = (!result.success).then(|| result.message.clone());
                        (status, error, Some(result))
                    }
                    Err(err) => (StepStatus::Failed, Some(err.to_string()), None),
                }
            }
            StepAction::Navigate { .. } => (
                StepStatus::Skipped,
                Some(format!("unsupported step type: {}", step.action.kind())),
                None,
            ),
        };

        StepResult {
            step_id: step.id.clone(),
            step_type: step.action.kind().to_string(),
            status,
            duration_ms: start.elapsed().as_millis() as u64,
            error,
            assertion,
        }
    }
}
