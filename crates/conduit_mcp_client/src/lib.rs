//! Downstream MCP client: conduit acting as an MCP *client* of other
//! servers, the reverse direction from `conduit_protocol`'s server-side
//! state machine. A workflow `tool` step resolves to a call through here.

mod circuit_breaker;
mod client;
mod connection;

pub use circuit_breaker::{retry_with_backoff, CircuitBreaker, CircuitState, RetryConfig};
pub use client::{DownstreamClient, DownstreamServerConfig, ProgressSink, ScopedExecutor};
pub use connection::Connection;
