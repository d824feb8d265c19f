//! Capability negotiation for the `initialize` handshake.

use serde_json::{json, Value};

/// Highest protocol version this engine speaks. Echoed back to the client
/// verbatim if it requested an older version we still understand;
/// otherwise this is what we advertise.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Versions we can still interoperate with, newest first.
const SUPPORTED_VERSIONS: &[&str] = &[PROTOCOL_VERSION, "2024-11-05"];

/// Pick the protocol version to reply with: the client's requested version
/// if we support it, otherwise our highest supported version.
pub fn negotiate_version(requested: &str) -> &'static str {
    SUPPORTED_VERSIONS
        .iter()
        .find(|&&v| v == requested)
        .copied()
        .unwrap_or(PROTOCOL_VERSION)
}

/// This engine's capability set: a fixed, non-dynamic tool list, and task
/// support scoped to `tools/call` plus listing and cancellation.
pub fn server_capabilities() -> Value {
    json!({
        "tools": { "listChanged": false },
        "tasks": {
            "requests": { "tools/call": true },
            "list": true,
            "cancel": true,
        },
    })
}
