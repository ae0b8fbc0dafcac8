//! # cake-bridge
//!
//! Remote execution bridge: lets the test runner, living in a
//! privileged context, command DOM reads and mutations inside the
//! untrusted page context through an asynchronous request/response
//! protocol.
//!
//! ```text
//! TestRunner ─▶ BridgeDriver ─▶ BridgeTransport ══ JSON ══▶ PageResponder ─▶ PageAccessor
//! ```
//!
//! Every request is answered exactly once; the caller side also
//! applies a deadline to each round-trip so an unreachable page
//! context cannot hang a run.

mod driver;
mod responder;
mod transport;

pub use driver::BridgeDriver;
pub use responder::PageResponder;
pub use transport::{
    BridgeError, BridgeReceiver, BridgeTransport, ChannelTransport, DEFAULT_CALL_TIMEOUT,
};
