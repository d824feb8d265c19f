//! Task manager error types.

/// Specific error conditions for task lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskErrorKind {
    /// No task exists with the given id, or it has already been swept
    NotFound(String),
    /// The task's TTL elapsed before it reached a terminal state
    Expired(String),
    /// An attempted status transition is not permitted by the task state machine
    InvalidTransition {
        /// Status the task was in
        from: String,
        /// Status that was requested
        to: String,
    },
    /// `tasks/result` blocked past its timeout without the task reaching a terminal state
    Timeout,
}

impl std::fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskErrorKind::NotFound(id) => write!(f, "no such task '{}'", id),
            TaskErrorKind::Expired(id) => write!(f, "task '{}' expired", id),
            TaskErrorKind::InvalidTransition { from, to } => {
                write!(f, "cannot transition task from '{}' to '{}'", from, to)
            }
            TaskErrorKind::Timeout => write!(f, "timed out waiting for task result"),
        }
    }
}

/// Error type for task manager operations.
#[derive(Debug, Clone)]
pub struct TaskError {
    /// The specific error condition
    pub kind: TaskErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl TaskError {
    /// Create a new TaskError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: TaskErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Task Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for TaskError {}
