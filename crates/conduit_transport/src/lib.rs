//! Framing, sessions, and the single-reader dispatcher shared by every
//! JSON-RPC endpoint `conduit` speaks — the MCP server surface over stdio
//! and Unix sockets, and the downstream client connections it makes out to
//! child MCP servers.

mod dispatcher;
mod framing;
mod message;
mod session;

pub use dispatcher::{Dispatcher, IncomingHandler};
pub use framing::Framing;
pub use message::{
    encode_error, encode_notification, encode_request, encode_response, error_codes, classify,
    IncomingMessage, JsonRpcError, RequestId,
};
pub use session::{Session, SessionReader, SessionWriter};

pub use tokio::net::UnixListener;
