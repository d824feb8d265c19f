//! Shared error taxonomy for the `conduit` workspace.
//!
//! Every concern gets its own `FooError`/`FooErrorKind` pair carrying a
//! `#[track_caller]`-captured source location, following the pattern used
//! throughout this workspace. [`ConduitError`] aggregates them behind one
//! `From`-convertible enum so call sites deep in a crate can use `?` and
//! still let the top of the stack (the `conduit` binary, or a crate
//! boundary) match on the concern that actually failed.

mod config;
mod downstream;
mod not_implemented;
mod protocol;
mod provider;
mod sandbox;
mod task;
mod transport;
mod validation;
mod workflow;

pub use config::ConfigError;
pub use downstream::{DownstreamError, DownstreamErrorKind};
pub use not_implemented::NotImplementedError;
pub use protocol::{ProtocolError, ProtocolErrorKind};
pub use provider::{ProviderError, ProviderErrorKind};
pub use sandbox::{SandboxError, SandboxErrorKind};
pub use task::{TaskError, TaskErrorKind};
pub use transport::{TransportError, TransportErrorKind};
pub use validation::{ValidationError, ValidationErrorKind, ValidationLocation};
pub use workflow::{WorkflowError, WorkflowErrorKind};

/// The union of every concern-specific error type raised anywhere in the
/// workspace. Crates are free to return their own narrower error type from
/// a public function; this enum exists for call sites that cross crate
/// boundaries and need one type to carry upward.
#[derive(Debug, Clone, derive_more::Display, derive_more::From, derive_more::Error)]
pub enum ConduitError {
    /// Transport/framing/dispatcher failure
    #[display("{_0}")]
    Transport(TransportError),
    /// MCP protocol state-machine failure
    #[display("{_0}")]
    Protocol(ProtocolError),
    /// Task manager failure
    #[display("{_0}")]
    Task(TaskError),
    /// LLM provider adapter failure
    #[display("{_0}")]
    Provider(ProviderError),
    /// Workflow loading or execution failure
    #[display("{_0}")]
    Workflow(WorkflowError),
    /// Skill sandbox failure
    #[display("{_0}")]
    Sandbox(SandboxError),
    /// Downstream MCP client failure
    #[display("{_0}")]
    Downstream(DownstreamError),
    /// Structural validation failure
    #[display("{_0}")]
    Validation(ValidationError),
    /// Configuration discovery/parsing failure
    #[display("{_0}")]
    Config(ConfigError),
    /// A code path that is intentionally unimplemented
    #[display("{_0}")]
    NotImplemented(NotImplementedError),
}

/// Convenience alias for `Result<T, ConduitError>`.
pub type ConduitResult<T> = std::result::Result<T, ConduitError>;
