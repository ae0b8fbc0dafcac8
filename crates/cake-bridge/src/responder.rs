//! Page-side request responder.
//!
//! [`PageResponder`] answers every [`RuntimeRequest`] exactly once.
//! Callers have no transport-level acknowledgement beyond the response
//! itself, so a dropped request would hang them until their call
//! deadline: locating a nonexistent element, an unparsable selector,
//! or a malformed payload all produce a well-formed `{ok:false}`
//! response, never silence.

use crate::transport::BridgeReceiver;
use cake_core::{AssertionEngine, PageAccessor};
use cake_proto::{RuntimeRequest, RuntimeResponse};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Answers bridge requests against a page document.
pub struct PageResponder {
    page: Arc<dyn PageAccessor>,
    engine: AssertionEngine,
    inspecting: AtomicBool,
}

impl PageResponder {
    /// Creates a responder over the given page.
    pub fn new(page: Arc<dyn PageAccessor>) -> Self {
        Self {
            page,
            engine: AssertionEngine::new(),
            inspecting: AtomicBool::new(false),
        }
    }

    /// Whether inspect mode is currently on.
    pub fn is_inspecting(&self) -> bool {
        self.inspecting.load(Ordering::SeqCst)
    }

    /// Handles one request. Total: every variant gets a response.
    pub async fn handle(&self, request: RuntimeRequest) -> RuntimeResponse {
        debug!(request = request.kind(), "handling bridge request");
        match request {
            RuntimeRequest::Ping => RuntimeResponse::Ack,
            RuntimeRequest::StartInspect => {
                self.inspecting.store(true, Ordering::SeqCst);
                RuntimeResponse::Ack
            }
            RuntimeRequest::StopInspect => {
                self.inspecting.store(false, Ordering::SeqCst);
                RuntimeResponse::Ack
            }
            RuntimeRequest::QueryElement { selector } => match self.page.query(&selector) {
                Ok(found) => RuntimeResponse::Query {
                    found: found.is_some(),
                },
                Err(err) => RuntimeResponse::error(err.to_string()),
            },
            RuntimeRequest::ClickElement { selector } => match self.page.query(&selector) {
                Ok(Some(element)) => match element.click() {
                    Ok(()) => RuntimeResponse::Click { clicked: true },
                    Err(err) => RuntimeResponse::error(err.to_string()),
                },
                Ok(None) => RuntimeResponse::error(format!("element not found: `{selector}`")),
                Err(err) => RuntimeResponse::error(err.to_string()),
            },
            RuntimeRequest::InputElement { selector, value } => match self.page.query(&selector) {
                Ok(Some(element)) => match element.set_value(&value) {
                    Ok(()) => RuntimeResponse::Input { inputted: true },
                    Err(err) => RuntimeResponse::error(err.to_string()),
                },
                Ok(None) => RuntimeResponse::error(format!("element not found: `{selector}`")),
                Err(err) => RuntimeResponse::error(err.to_string()),
            },
            RuntimeRequest::AssertElement {
                selector,
                assertion,
            } => {
                let result = self
                    .engine
                    .execute(self.page.as_ref(), &selector, &assertion)
                    .await;
                RuntimeResponse::Assert {
                    success: result.success,
                    message: result.message,
                    actual: result.actual,
                }
            }
        }
    }

    /// Serves requests from a channel until the caller side closes.
    pub async fn serve(&self, mut receiver: BridgeReceiver) {
        while let Some(envelope) = receiver.recv().await {
            let response = match serde_json::from_value::<RuntimeRequest>(envelope.payload) {
                Ok(request) => self.handle(request).await,
                Err(err) => RuntimeResponse::error(format!("malformed request: {err}")),
            };
            let raw = serde_json::to_value(&response).unwrap_or_else(|err| {
                warn!(%err, "failed to serialize response");
                serde_json::json!({"ok": false, "error": "response serialization failure"})
            });
            if envelope.reply.send(raw).is_err() {
                debug!("caller went away before the response was delivered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{BridgeTransport, ChannelTransport};
    use cake_proto::{AssertionKind, AssertionSpec, SpecValue};
    use cake_core::MemoryPage;
    use serde_json::json;
    use std::time::Duration;

    fn page() -> MemoryPage {
        MemoryPage::from_value(json!({
            "tag": "body",
            "children": [
                {
                    "tag": "button", "id": "login-btn", "text": "Log in",
                    "onClick": [
                        {"action": "set_text", "selector": "#status", "text": "Welcome"}
                    ]
                },
                {"tag": "input", "id": "email"},
                {"tag": "div", "id": "status", "text": "Signed out"}
            ]
        }))
        .unwrap()
    }

    fn responder() -> PageResponder {
        PageResponder::new(Arc::new(page()))
    }

    #[tokio::test]
    async fn test_every_request_variant_yields_a_response() {
        let responder = responder();
        let requests = vec![
            RuntimeRequest::Ping,
            RuntimeRequest::StartInspect,
            RuntimeRequest::StopInspect,
            RuntimeRequest::QueryElement {
                selector: "#login-btn".into(),
            },
            RuntimeRequest::QueryElement {
                selector: "#missing".into(),
            },
            RuntimeRequest::ClickElement {
                selector: "#login-btn".into(),
            },
            RuntimeRequest::ClickElement {
                selector: "#missing".into(),
            },
            RuntimeRequest::InputElement {
                selector: "#email".into(),
                value: "v".into(),
            },
            RuntimeRequest::InputElement {
                selector: "#missing".into(),
                value: "v".into(),
            },
            RuntimeRequest::AssertElement {
                selector: "#status".into(),
                assertion: AssertionSpec::new(AssertionKind::ElementExists, true)
                    .with_timeout(Duration::from_millis(50)),
            },
        ];
        for request in requests {
            let kind = request.kind();
            // Any of the closed response variants counts as an answer;
            // what must never happen is a missing one.
            let response = responder.handle(request).await;
            let raw = serde_json::to_value(&response).unwrap();
            assert!(raw.get("ok").is_some(), "no ok field for {kind}");
        }
    }

    #[tokio::test]
    async fn test_ping_acks() {
        assert_eq!(responder().handle(RuntimeRequest::Ping).await, RuntimeResponse::Ack);
    }

    #[tokio::test]
    async fn test_inspect_toggles() {
        let responder = responder();
        assert!(!responder.is_inspecting());
        responder.handle(RuntimeRequest::StartInspect).await;
        assert!(responder.is_inspecting());
        responder.handle(RuntimeRequest::StopInspect).await;
        assert!(!responder.is_inspecting());
    }

    #[tokio::test]
    async fn test_click_not_found_is_structured_error() {
        let response = responder()
            .handle(RuntimeRequest::ClickElement {
                selector: "#missing".into(),
            })
            .await;
        let RuntimeResponse::Error { error } = response else {
            panic!("expected an error response");
        };
        assert!(!error.is_empty());
        assert!(error.contains("#missing"));
    }

    #[tokio::test]
    async fn test_invalid_selector_is_structured_error() {
        let response = responder()
            .handle(RuntimeRequest::QueryElement {
                selector: "a, b".into(),
            })
            .await;
        assert!(matches!(response, RuntimeResponse::Error { .. }));
    }

    #[tokio::test]
    async fn test_assert_round_trip_carries_actual() {
        let responder = responder();
        let response = responder
            .handle(RuntimeRequest::AssertElement {
                selector: "#status".into(),
                assertion: AssertionSpec::new(AssertionKind::TextEquals, "Welcome")
                    .with_timeout(Duration::from_millis(80))
                    .with_retry_interval(Duration::from_millis(20)),
            })
            .await;
        let RuntimeResponse::Assert {
            success,
            message,
            actual,
        } = response
        else {
            panic!("expected an assert response");
        };
        assert!(!success);
        assert!(message.starts_with("timeout"));
        assert_eq!(actual, Some(SpecValue::Str("Signed out".into())));
    }

    #[tokio::test]
    async fn test_serve_round_trips() {
        let (transport, receiver) = ChannelTransport::pair();
        let responder = Arc::new(responder());
        let server = tokio::spawn({
            let responder = Arc::clone(&responder);
            async move { responder.serve(receiver).await }
        });

        let response = transport.send(RuntimeRequest::Ping).await.unwrap();
        assert_eq!(response, RuntimeResponse::Ack);

        drop(transport);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_answers_malformed_payloads() {
        let (transport, receiver) = ChannelTransport::pair();
        let responder = Arc::new(responder());
        let server = tokio::spawn({
            let responder = Arc::clone(&responder);
            async move { responder.serve(receiver).await }
        });

        let raw = transport
            .send_raw(json!({"type": "NO_SUCH_MESSAGE"}))
            .await
            .unwrap();
        assert_eq!(raw["ok"], false);
        assert!(raw["error"].as_str().unwrap().contains("malformed request"));

        drop(transport);
        server.await.unwrap();
    }
}
