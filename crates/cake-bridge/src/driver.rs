//! Remote page driver.
//!
//! [`BridgeDriver`] implements the runner's [`PageDriver`] seam over a
//! [`BridgeTransport`], so the same `TestRunner` drives a page that
//! lives across the isolated-context boundary. Error responses from
//! the page side become failed steps; they never escape the runner's
//! step loop.

use crate::transport::{BridgeError, BridgeTransport};
use async_trait::async_trait;
use cake_core::{DriverError, PageDriver};
use cake_proto::{
    AssertionResult, AssertionSpec, RuntimeRequest, RuntimeResponse, now_ms,
};
use std::sync::Arc;
use std::time::Instant;

/// Drives the page through the bridge message protocol.
pub struct BridgeDriver {
    transport: Arc<dyn BridgeTransport>,
}

impl BridgeDriver {
    /// Creates a driver over the given transport.
    pub fn new(transport: Arc<dyn BridgeTransport>) -> Self {
        Self { transport }
    }

    /// Sends a liveness probe and reports whether the page context
    /// answered.
    pub async fn ping(&self) -> bool {
        matches!(
            self.transport.send(RuntimeRequest::Ping).await,
            Ok(RuntimeResponse::Ack)
        )
    }

    async fn send(&self, request: RuntimeRequest) -> Result<RuntimeResponse, DriverError> {
        self.transport.send(request).await.map_err(map_error)
    }
}

fn map_error(err: BridgeError) -> DriverError {
    DriverError::Transport(err.to_string())
}

fn unexpected(response: &RuntimeResponse) -> DriverError {
    DriverError::Transport(format!("unexpected bridge response: {response:?}"))
}

#[async_trait]
impl PageDriver for BridgeDriver {
    async fn query_element(&self, selector: &str) -> Result<bool, DriverError> {
        let response = self
            .send(RuntimeRequest::QueryElement {
                selector: selector.to_string(),
            })
            .await?;
        match response {
            RuntimeResponse::Query { found } => Ok(found),
            RuntimeResponse::Error { error } => Err(DriverError::Transport(error)),
            other => Err(unexpected(&other)),
        }
    }

    async fn click_element(&self, selector: &str) -> Result<(), DriverError> {
        let response = self
            .send(RuntimeRequest::ClickElement {
                selector: selector.to_string(),
            })
            .await?;
        match response {
            RuntimeResponse::Click { clicked: true } => Ok(()),
            RuntimeResponse::Click { clicked: false } => {
                Err(DriverError::NotFound(selector.to_string()))
            }
            RuntimeResponse::Error { error } => Err(DriverError::Transport(error)),
            other => Err(unexpected(&other)),
        }
    }

    async fn input_element(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let response = self
            .send(RuntimeRequest::InputElement {
                selector: selector.to_string(),
                value: value.to_string(),
            })
            .await?;
        match response {
            RuntimeResponse::Input { inputted: true } => Ok(()),
            RuntimeResponse::Input { inputted: false } => {
                Err(DriverError::NotFound(selector.to_string()))
            }
            RuntimeResponse::Error { error } => Err(DriverError::Transport(error)),
            other => Err(unexpected(&other)),
        }
    }

    async fn assert_element(
        &self,
        selector: &str,
        spec: &AssertionSpec,
    ) -> Result<AssertionResult, DriverError> {
        let timestamp_ms = now_ms();
        let start = Instant::now();
        let response = self
            .send(RuntimeRequest::AssertElement {
                selector: selector.to_string(),
                assertion: spec.clone(),
            })
            .await?;
        match response {
            // The page side ran the full engine; re-wrap its verdict
            // with caller-side timing.
            RuntimeResponse::Assert {
                success,
                message,
                actual,
            } => Ok(AssertionResult {
                success,
                message,
                actual,
                expected: spec.expected.clone(),
                timestamp_ms,
                duration_ms: start.elapsed().as_millis() as u64,
                error_detail: None,
            }),
            RuntimeResponse::Error { error } => Err(DriverError::Transport(error)),
            other => Err(unexpected(&other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cake_proto::{AssertionKind, SpecValue};

    /// Transport that replies from a script, for driver-level mapping
    /// tests without a real responder.
    struct ScriptedTransport {
        reply: RuntimeResponse,
    }

    #[async_trait]
    impl BridgeTransport for ScriptedTransport {
        async fn send(&self, _request: RuntimeRequest) -> Result<RuntimeResponse, BridgeError> {
            Ok(self.reply.clone())
        }
    }

    fn driver(reply: RuntimeResponse) -> BridgeDriver {
        BridgeDriver::new(Arc::new(ScriptedTransport { reply }))
    }

    #[tokio::test]
    async fn test_query_maps_found() {
        let found = driver(RuntimeResponse::Query { found: true });
        assert!(found.query_element("#a").await.unwrap());
    }

    #[tokio::test]
    async fn test_error_response_becomes_transport_error() {
        let failing = driver(RuntimeResponse::error("element not found: `#a`"));
        let err = failing.click_element("#a").await.unwrap_err();
        assert_eq!(
            err,
            DriverError::Transport("element not found: `#a`".to_string())
        );
    }

    #[tokio::test]
    async fn test_mismatched_variant_is_rejected() {
        let weird = driver(RuntimeResponse::Ack);
        let err = weird.query_element("#a").await.unwrap_err();
        assert!(err.to_string().contains("unexpected bridge response"));
    }

    #[tokio::test]
    async fn test_assert_rewraps_result() {
        let replying = driver(RuntimeResponse::Assert {
            success: true,
            message: "element exists".into(),
            actual: Some(SpecValue::Bool(true)),
        });
        let spec = AssertionSpec::new(AssertionKind::ElementExists, true);
        let result = replying.assert_element("#a", &spec).await.unwrap();
        assert!(result.success);
        assert_eq!(result.expected, SpecValue::Bool(true));
        assert_eq!(result.actual, Some(SpecValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_ping() {
        let ok = driver(RuntimeResponse::Ack);
        assert!(ok.ping().await);
        let bad = driver(RuntimeResponse::error("gone"));
        assert!(!bad.ping().await);
    }
}
