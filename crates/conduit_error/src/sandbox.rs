//! Skill sandbox error types.

/// Specific error conditions for sandbox invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SandboxErrorKind {
    /// The configured container image could not be pulled or is not local
    ImagePullFailed(String),
    /// Preparing the workspace (scratch dir, mounts, script materialization) failed
    WorkspaceSetup(String),
    /// Spawning the container process failed
    LaunchFailed(String),
    /// The invocation exceeded its configured timeout and was killed
    Timeout,
    /// The skill process exited with a non-zero status
    NonZeroExit(i32),
    /// No skill is registered under the requested name
    UnknownSkill(String),
    /// The skill descriptor failed validation (missing image, invalid network mode, etc.)
    InvalidDescriptor(String),
}

impl std::fmt::Display for SandboxErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxErrorKind::ImagePullFailed(msg) => write!(f, "image pull failed: {}", msg),
            SandboxErrorKind::WorkspaceSetup(msg) => write!(f, "workspace setup failed: {}", msg),
            SandboxErrorKind::LaunchFailed(msg) => write!(f, "container launch failed: {}", msg),
            SandboxErrorKind::Timeout => write!(f, "skill execution timed out"),
            SandboxErrorKind::NonZeroExit(code) => write!(f, "skill exited with status {}", code),
            SandboxErrorKind::UnknownSkill(name) => write!(f, "no skill named '{}'", name),
            SandboxErrorKind::InvalidDescriptor(msg) => {
                write!(f, "invalid skill descriptor: {}", msg)
            }
        }
    }
}

/// Error type for skill sandbox operations.
#[derive(Debug, Clone)]
pub struct SandboxError {
    /// The specific error condition
    pub kind: SandboxErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl SandboxError {
    /// Create a new SandboxError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SandboxErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sandbox Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for SandboxError {}
