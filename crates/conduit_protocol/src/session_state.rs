//! The MCP session's own lifecycle: `new -> initializing -> ready ->
//! closing -> closed`. Separate from [`conduit_tasks::TaskStatus`] — this
//! tracks the handshake, not any individual long-running call.

use conduit_error::{ProtocolError, ProtocolErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    Initializing,
    Ready,
    Closing,
    Closed,
}

impl SessionState {
    /// Whether `method` is acceptable to handle while in this state.
    pub fn accepts(self, method: &str) -> bool {
        match self {
            SessionState::New => method == "initialize",
            SessionState::Initializing => false, // only the `initialized` notification, handled separately
            SessionState::Ready => matches!(
                method,
                "tools/list"
                    | "tools/call"
                    | "tasks/get"
                    | "tasks/result"
                    | "tasks/list"
                    | "tasks/cancel"
                    | "ping"
            ),
            SessionState::Closing | SessionState::Closed => false,
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (New, Initializing) | (Initializing, Ready) | (Ready, Closing) | (Closing, Closed)
        )
    }

    pub fn transition(&mut self, next: Self) -> Result<(), ProtocolError> {
        if !self.can_transition_to(next) {
            return Err(ProtocolError::new(ProtocolErrorKind::InvalidState {
                found: format!("{self:?}"),
                expected: format!("a state reachable from {self:?}, not {next:?}"),
            }));
        }
        *self = next;
        Ok(())
    }
}
