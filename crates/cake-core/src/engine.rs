//! Assertion execution with timeout and retry.
//!
//! DOM assertions race asynchronous page changes, so a single
//! evaluation would produce false negatives on slow-rendering content.
//! [`AssertionEngine::execute`] polls the evaluator until it succeeds
//! or the spec's deadline passes, sleeping the retry interval between
//! attempts but never past the deadline. It never fails: evaluation
//! errors and timeouts all come back as a failed [`AssertionResult`]
//! carrying the last known reason.

use crate::evaluator::{self, EvalError};
use crate::page::PageAccessor;
use cake_proto::{AssertionResult, AssertionSpec, SpecValue, now_ms};
use std::time::Instant;
use tracing::debug;

/// Executes assertion specs against a page with polling.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionEngine;

impl AssertionEngine {
    /// Creates an engine.
    pub fn new() -> Self {
        Self
    }

    /// Runs one assertion to completion.
    ///
    /// Configuration errors (missing operand, non-numeric count) are
    /// reported immediately without polling; everything else retries
    /// until success or deadline.
    pub async fn execute(
        &self,
        page: &dyn PageAccessor,
        selector: &str,
        spec: &AssertionSpec,
    ) -> AssertionResult {
        let timestamp_ms = now_ms();
        let start = Instant::now();

        if let Err(err) = spec.validate() {
            debug!(kind = %spec.kind, %err, "assertion spec rejected");
            return AssertionResult {
                success: false,
                message: format!("invalid assertion spec: {err}"),
                actual: None,
                expected: spec.expected.clone(),
                timestamp_ms,
                duration_ms: start.elapsed().as_millis() as u64,
                error_detail: Some(err.to_string()),
            };
        }

        let timeout = spec.timeout();
        let retry_interval = spec.retry_interval();
        let mut last_message = String::from("assertion never evaluated");
        let mut last_actual: Option<SpecValue> = None;
        let mut last_detail: Option<String> = None;

        loop {
            match evaluator::evaluate(
                page,
                selector,
                spec.kind,
                &spec.expected,
                spec.attribute.as_deref(),
                spec.css_property.as_deref(),
            ) {
                Ok(eval) if eval.success => {
                    return AssertionResult {
                        success: true,
                        message: eval.message,
                        actual: eval.actual,
                        expected: spec.expected.clone(),
                        timestamp_ms,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error_detail: None,
                    };
                }
                Ok(eval) => {
                    last_message = eval.message;
                    last_actual = eval.actual;
                    last_detail = None;
                }
                Err(EvalError::Spec(err)) => {
                    // Operand problems surfaced mid-dispatch are as
                    // terminal as a failed validate().
                    return AssertionResult {
                        success: false,
                        message: format!("invalid assertion spec: {err}"),
                        actual: None,
                        expected: spec.expected.clone(),
                        timestamp_ms,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error_detail: Some(err.to_string()),
                    };
                }
                Err(EvalError::Page(err)) => {
                    last_message = err.to_string();
                    last_actual = None;
                    last_detail = Some(err.to_string());
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                break;
            }
            // Sleep the retry interval, clamped so we re-check right at
            // the deadline instead of overshooting it.
            let remaining = timeout - elapsed;
            tokio::time::sleep(retry_interval.min(remaining)).await;
        }

        debug!(
            kind = %spec.kind,
            selector,
            timeout_ms = spec.timeout_ms,
            "assertion timed out: {last_message}"
        );
        AssertionResult {
            success: false,
            message: format!("timeout ({}ms): {last_message}", spec.timeout_ms),
            actual: last_actual,
            expected: spec.expected.clone(),
            timestamp_ms,
            duration_ms: start.elapsed().as_millis() as u64,
            error_detail: last_detail,
        }
    }
}
