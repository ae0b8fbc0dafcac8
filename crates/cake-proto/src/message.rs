//! Cross-context bridge message protocol.
//!
//! The panel context commands DOM reads and mutations inside the page
//! context through these request/response payloads. Requests are
//! discriminated by a SCREAMING_SNAKE `type` field; responses always
//! carry `ok: bool`, with `error` present exactly when `ok` is false
//! and variant-specific fields when it is true.
//!
//! [`RuntimeResponse`] is a closed sum so responders and callers match
//! it exhaustively; the `{ok, ...}` wire shape is produced through a
//! conversion struct rather than leaking option-soup into the API.

use crate::assertion::{AssertionSpec, SpecValue};
use serde::{Deserialize, Serialize};

/// A request sent from the panel context into the page context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuntimeRequest {
    /// Liveness probe; answered with [`RuntimeResponse::Ack`].
    #[serde(rename = "PING")]
    Ping,

    /// Begin element inspection in the page.
    #[serde(rename = "START_INSPECT")]
    StartInspect,

    /// End element inspection.
    #[serde(rename = "STOP_INSPECT")]
    StopInspect,

    /// Does an element matching `selector` exist?
    #[serde(rename = "QUERY_ELEMENT")]
    QueryElement { selector: String },

    /// Click the first element matching `selector`.
    #[serde(rename = "CLICK_ELEMENT")]
    ClickElement { selector: String },

    /// Set the value of the first element matching `selector`.
    #[serde(rename = "INPUT_ELEMENT")]
    InputElement { selector: String, value: String },

    /// Evaluate an assertion against `selector` in the page context.
    #[serde(rename = "ASSERT_ELEMENT")]
    AssertElement {
        selector: String,
        assertion: AssertionSpec,
    },
}

impl RuntimeRequest {
    /// The wire `type` tag of this request.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeRequest::Ping => "PING",
            RuntimeRequest::StartInspect => "START_INSPECT",
            RuntimeRequest::StopInspect => "STOP_INSPECT",
            RuntimeRequest::QueryElement { .. } => "QUERY_ELEMENT",
            RuntimeRequest::ClickElement { .. } => "CLICK_ELEMENT",
            RuntimeRequest::InputElement { .. } => "INPUT_ELEMENT",
            RuntimeRequest::AssertElement { .. } => "ASSERT_ELEMENT",
        }
    }
}

/// A response from the page context.
///
/// Every request is answered exactly once; a missing element or a
/// responder-side failure is a well-formed [`RuntimeResponse::Error`],
/// never a dropped request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireResponse", try_from = "WireResponse")]
pub enum RuntimeResponse {
    /// Bare `{ok: true}` acknowledgement (ping, inspect control).
    Ack,

    /// Answer to `QUERY_ELEMENT`.
    Query { found: bool },

    /// Answer to `CLICK_ELEMENT`.
    Click { clicked: bool },

    /// Answer to `INPUT_ELEMENT`.
    Input { inputted: bool },

    /// Answer to `ASSERT_ELEMENT`.
    Assert {
        success: bool,
        message: String,
        actual: Option<SpecValue>,
    },

    /// `{ok: false, error}` failure.
    Error { error: String },
}

impl RuntimeResponse {
    /// A failure response with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        RuntimeResponse::Error {
            error: message.into(),
        }
    }

    /// True unless this is an [`RuntimeResponse::Error`].
    pub fn is_ok(&self) -> bool {
        !matches!(self, RuntimeResponse::Error { .. })
    }
}

/// The literal `{ok, ...}` JSON shape exchanged across the bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    found: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    clicked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inputted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actual: Option<SpecValue>,
}

impl From<RuntimeResponse> for WireResponse {
    fn from(resp: RuntimeResponse) -> Self {
        let ok = WireResponse {
            ok: true,
            ..WireResponse::default()
        };
        match resp {
            RuntimeResponse::Ack => ok,
            RuntimeResponse::Query { found } => WireResponse {
                found: Some(found),
                ..ok
            },
            RuntimeResponse::Click { clicked } => WireResponse {
                clicked: Some(clicked),
                ..ok
            },
            RuntimeResponse::Input { inputted } => WireResponse {
                inputted: Some(inputted),
                ..ok
            },
            RuntimeResponse::Assert {
                success,
                message,
                actual,
            } => WireResponse {
                success: Some(success),
                message: Some(message),
                actual,
                ..ok
            },
            RuntimeResponse::Error { error } => WireResponse {
                ok: false,
                error: Some(error),
                ..WireResponse::default()
            },
        }
    }
}

impl TryFrom<WireResponse> for RuntimeResponse {
    type Error = String;

    fn try_from(wire: WireResponse) -> Result<Self, String> {
        if !wire.ok {
            let error = wire
                .error
                .ok_or_else(|| "response has ok:false but no error field".to_string())?;
            return Ok(RuntimeResponse::Error { error });
        }
        if let Some(success) = wire.success {
            return Ok(RuntimeResponse::Assert {
                success,
                message: wire.message.unwrap_or_default(),
                actual: wire.actual,
            });
        }
        if let Some(found) = wire.found {
            return Ok(RuntimeResponse::Query { found });
        }
        if let Some(clicked) = wire.clicked {
            return Ok(RuntimeResponse::Click { clicked });
        }
        if let Some(inputted) = wire.inputted {
            return Ok(RuntimeResponse::Input { inputted });
        }
        Ok(RuntimeResponse::Ack)
    }
}
