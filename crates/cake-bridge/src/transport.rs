//! Bridge transport.
//!
//! The runner lives in a privileged context; the page document lives
//! in an isolated one. [`BridgeTransport`] is the caller-side contract
//! for crossing that boundary: one request, exactly one response.
//!
//! [`ChannelTransport`] is the in-process implementation. Payloads are
//! serialized to [`serde_json::Value`] before they enter the channel
//! and deserialized on the far side, so both directions exercise the
//! real JSON wire shapes. Every round-trip carries a caller-side
//! deadline — a responder that became unreachable (page navigated
//! away, context torn down) surfaces as an error instead of hanging
//! the runner.

use async_trait::async_trait;
use cake_proto::{RuntimeRequest, RuntimeResponse};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Deadline applied to each bridge round-trip.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced by a bridge call.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The page context is unreachable or did not answer in time.
    #[error("bridge transport failure: {0}")]
    Transport(String),

    /// A payload failed to (de)serialize.
    #[error("bridge payload error: {0}")]
    Payload(String),
}

/// Caller-side contract for commanding the page context.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Sends one request and awaits its response.
    async fn send(&self, request: RuntimeRequest) -> Result<RuntimeResponse, BridgeError>;
}

/// One in-flight request on the channel: the serialized payload and
/// the slot its response must be written into.
pub(crate) struct Envelope {
    pub(crate) payload: serde_json::Value,
    pub(crate) reply: oneshot::Sender<serde_json::Value>,
}

/// Page-side end of a channel transport; feed it to
/// [`crate::PageResponder::serve`].
pub struct BridgeReceiver {
    rx: mpsc::Receiver<Envelope>,
}

impl BridgeReceiver {
    pub(crate) async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

/// In-process transport over a tokio channel pair.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Envelope>,
    call_timeout: Duration,
}

impl ChannelTransport {
    /// Creates a connected transport/receiver pair.
    pub fn pair() -> (ChannelTransport, BridgeReceiver) {
        let (tx, rx) = mpsc::channel(16);
        (
            ChannelTransport {
                tx,
                call_timeout: DEFAULT_CALL_TIMEOUT,
            },
            BridgeReceiver { rx },
        )
    }

    /// Overrides the per-call deadline.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sends a raw payload, bypassing request serialization. Lets
    /// tests exercise the responder's malformed-payload path.
    #[cfg(test)]
    pub(crate) async fn send_raw(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, BridgeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BridgeError::Transport("page context is gone".to_string()))?;
        tokio::time::timeout(self.call_timeout, reply_rx)
            .await
            .map_err(|_| BridgeError::Transport("no response".to_string()))?
            .map_err(|_| BridgeError::Transport("responder dropped the request".to_string()))
    }
}

#[async_trait]
impl BridgeTransport for ChannelTransport {
    async fn send(&self, request: RuntimeRequest) -> Result<RuntimeResponse, BridgeError> {
        let kind = request.kind();
        let payload =
            serde_json::to_value(&request).map_err(|e| BridgeError::Payload(e.to_string()))?;
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(Envelope {
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BridgeError::Transport("page context is gone".to_string()))?;

        debug!(request = kind, "bridge request sent");
        let raw = tokio::time::timeout(self.call_timeout, reply_rx)
            .await
            .map_err(|_| {
                BridgeError::Transport(format!(
                    "no response to {kind} within {:?}",
                    self.call_timeout
                ))
            })?
            .map_err(|_| {
                BridgeError::Transport(format!("responder dropped {kind} without answering"))
            })?;

        serde_json::from_value(raw).map_err(|e| BridgeError::Payload(e.to_string()))
    }
}
