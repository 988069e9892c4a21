//! WebSocket transport for the carebot engine.
//!
//! Clients connect, receive a `hello` frame, and from then on see the full
//! stamped event stream. Text frames they send are parsed as command
//! envelopes and queued for the engine; frames that are not valid JSON get
//! an `error` reply on that connection only.

mod server;

pub use server::{BridgeServer, DEFAULT_PORT};
