//! The runner's seam to the page.
//!
//! [`PageDriver`] is what scenario execution needs from "the page",
//! whether that page lives in-process or across the bridge in an
//! isolated context. [`LocalDriver`] is the in-process implementation;
//! `cake-bridge` provides the remote one over the message protocol.

use crate::engine::AssertionEngine;
use crate::page::{PageAccessor, PageError};
use async_trait::async_trait;
use cake_proto::{AssertionResult, AssertionSpec};
use std::sync::Arc;
use thiserror::Error;

/// Errors a driver can surface to the runner.
///
/// All of them are recoverable: the runner records the failed step and
/// keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// No element matched the selector.
    #[error("element not found: `{0}`")]
    NotFound(String),

    /// The selector could not be parsed.
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    /// The page context could not be reached or answered with an
    /// error; the message carries the page-side detail verbatim.
    #[error("{0}")]
    Transport(String),
}

impl From<PageError> for DriverError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::InvalidSelector(s) => DriverError::InvalidSelector(s),
            PageError::Fixture(msg) => DriverError::Transport(msg),
        }
    }
}

/// Page operations the runner dispatches steps through.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Whether an element matching `selector` currently exists.
    async fn query_element(&self, selector: &str) -> Result<bool, DriverError>;

    /// Clicks the first element matching `selector`.
    async fn click_element(&self, selector: &str) -> Result<(), DriverError>;

    /// Sets the value of the first element matching `selector`,
    /// dispatching input/change notifications.
    async fn input_element(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    /// Runs an assertion to completion in the page context.
    async fn assert_element(
        &self,
        selector: &str,
        spec: &AssertionSpec,
    ) -> Result<AssertionResult, DriverError>;
}

/// In-process driver over a [`PageAccessor`].
pub struct LocalDriver {
    page: Arc<dyn PageAccessor>,
    engine: AssertionEngine,
}

impl LocalDriver {
    /// Creates a driver over the given page.
    pub fn new(page: Arc<dyn PageAccessor>) -> Self {
        Self {
            page,
            engine: AssertionEngine::new(),
        }
    }
}

#[async_trait]
impl PageDriver for LocalDriver {
    async fn query_element(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(self.page.query(selector)?.is_some())
    }

    async fn click_element(&self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .query(selector)?
            .ok_or_else(|| DriverError::NotFound(selector.to_string()))?;
        element.click()?;
        Ok(())
    }

    async fn input_element(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .query(selector)?
            .ok_or_else(|| DriverError::NotFound(selector.to_string()))?;
        element.set_value(value)?;
        Ok(())
    }

    async fn assert_element(
        &self,
        selector: &str,
        spec: &AssertionSpec,
    ) -> Result<AssertionResult, DriverError> {
        Ok(self.engine.execute(self.page.as_ref(), selector, spec).await)
    }
}
