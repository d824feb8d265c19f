//! Wire-transport error types: framing, I/O, and session lifecycle.

/// Specific error conditions for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Reading from the underlying stream failed
    Io(String),
    /// A frame could not be decoded (bad `Content-Length`, truncated body, invalid UTF-8)
    FramingError(String),
    /// Writing a frame to the underlying stream failed
    WriteFailed(String),
    /// The session's writer half was already closed
    Closed,
    /// The peer sent something before `initialize` completed, or sent `initialize` twice
    HandshakeFailed(String),
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Io(msg) => write!(f, "transport I/O error: {}", msg),
            TransportErrorKind::FramingError(msg) => write!(f, "framing error: {}", msg),
            TransportErrorKind::WriteFailed(msg) => write!(f, "write failed: {}", msg),
            TransportErrorKind::Closed => write!(f, "session is closed"),
            TransportErrorKind::HandshakeFailed(msg) => write!(f, "handshake failed: {}", msg),
        }
    }
}

/// Error type for transport and dispatcher operations.
///
/// # Examples
///
/// ```
/// use conduit_error::{TransportError, TransportErrorKind};
///
/// let err = TransportError::new(TransportErrorKind::Closed);
/// assert!(format!("{}", err).contains("closed"));
/// ```
#[derive(Debug, Clone)]
pub struct TransportError {
    /// The specific error condition
    pub kind: TransportErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl TransportError {
    /// Create a new TransportError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: TransportErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Transport Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for TransportError {}
