//! Downstream (child) MCP client error types.

/// Specific error conditions for calls made against a downstream MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DownstreamErrorKind {
    /// Spawning or connecting to the configured downstream server failed
    ConnectFailed(String),
    /// The downstream server rejected or failed a `tools/call`
    ToolCallFailed {
        /// Tool name
        tool: String,
        /// Error message
        message: String,
    },
    /// The circuit breaker for this downstream server is open
    CircuitOpen(String),
    /// All configured retry attempts were exhausted
    RetryExhausted(u32),
    /// A step referenced a downstream server not listed in its `servers:` scope
    ServerNotInScope(String),
}

impl std::fmt::Display for DownstreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownstreamErrorKind::ConnectFailed(msg) => write!(f, "connect failed: {}", msg),
            DownstreamErrorKind::ToolCallFailed { tool, message } => {
                write!(f, "tool call '{}' failed: {}", tool, message)
            }
            DownstreamErrorKind::CircuitOpen(server) => {
                write!(f, "circuit breaker open for server '{}'", server)
            }
            DownstreamErrorKind::RetryExhausted(attempts) => {
                write!(f, "retry exhausted after {} attempts", attempts)
            }
            DownstreamErrorKind::ServerNotInScope(server) => write!(
                f,
                "server '{}' is not in this step's servers scope",
                server
            ),
        }
    }
}

/// Error type for downstream MCP client operations.
#[derive(Debug, Clone)]
pub struct DownstreamError {
    /// The specific error condition
    pub kind: DownstreamErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl DownstreamError {
    /// Create a new DownstreamError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: DownstreamErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for DownstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Downstream Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for DownstreamError {}
