//! MCP protocol state-machine error types.

/// Specific error conditions for protocol operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProtocolErrorKind {
    /// No handler registered for the requested method
    UnknownMethod(String),
    /// A request arrived while the session was in a state that does not permit it
    InvalidState {
        /// State the session was in
        found: String,
        /// States the request is valid in
        expected: String,
    },
    /// Request body did not parse into a known JSON-RPC shape
    MalformedRequest(String),
    /// A downstream response did not parse into the expected shape
    MalformedResponse(String),
    /// The request's correlation id was cancelled via `notifications/cancelled`
    Cancelled,
}

impl std::fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolErrorKind::UnknownMethod(m) => write!(f, "unknown method '{}'", m),
            ProtocolErrorKind::InvalidState { found, expected } => write!(
                f,
                "invalid session state: found '{}', expected one of [{}]",
                found, expected
            ),
            ProtocolErrorKind::MalformedRequest(msg) => write!(f, "malformed request: {}", msg),
            ProtocolErrorKind::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
            ProtocolErrorKind::Cancelled => write!(f, "request was cancelled"),
        }
    }
}

/// Error type for MCP protocol state-machine operations.
#[derive(Debug, Clone)]
pub struct ProtocolError {
    /// The specific error condition
    pub kind: ProtocolErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ProtocolError {
    /// Create a new ProtocolError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ProtocolErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Protocol Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for ProtocolError {}
