//! LLM provider adapter error types.

/// Specific error conditions for provider operations, classified the way
/// `conduit_providers`'s failover chain needs: retryable conditions carry
/// enough detail to back off and try again, permanent ones do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// The provider responded with a non-success HTTP status
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or provider-supplied message
        message: String,
    },
    /// The provider asked the caller to slow down, optionally naming a delay
    RateLimited {
        /// `Retry-After` value in seconds, if the provider sent one
        retry_after_secs: Option<u64>,
    },
    /// The request exceeded the configured timeout without a response
    Timeout,
    /// The response body did not parse into the expected shape
    InvalidResponse(String),
    /// A condition that retrying will not fix (bad API key, model not found, 4xx other than 429)
    Permanent(String),
    /// No provider in the failover chain produced a usable response
    ChainExhausted(String),
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderErrorKind::Api { status, message } => {
                write!(f, "provider returned {}: {}", status, message)
            }
            ProviderErrorKind::RateLimited { retry_after_secs } => match retry_after_secs {
                Some(secs) => write!(f, "rate limited, retry after {}s", secs),
                None => write!(f, "rate limited"),
            },
            ProviderErrorKind::Timeout => write!(f, "request timed out"),
            ProviderErrorKind::InvalidResponse(msg) => write!(f, "invalid response: {}", msg),
            ProviderErrorKind::Permanent(msg) => write!(f, "permanent failure: {}", msg),
            ProviderErrorKind::ChainExhausted(msg) => {
                write!(f, "failover chain exhausted: {}", msg)
            }
        }
    }
}

impl ProviderErrorKind {
    /// Whether this condition is worth retrying against the same provider.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderErrorKind::Timeout | ProviderErrorKind::RateLimited { .. } => true,
            ProviderErrorKind::Api { status, .. } => *status >= 500,
            ProviderErrorKind::InvalidResponse(_)
            | ProviderErrorKind::Permanent(_)
            | ProviderErrorKind::ChainExhausted(_) => false,
        }
    }

    /// Whether this condition should trigger failover to the next provider
    /// in the chain, as opposed to aborting the step outright. `Permanent`
    /// is excluded: per spec.md §4.E's retry-classification table, a
    /// permanent condition (bad API key, model not found, non-429 4xx)
    /// aborts the step rather than trying the next provider in line.
    pub fn should_failover(&self) -> bool {
        !matches!(self, ProviderErrorKind::Permanent(_))
    }
}

/// Error type for provider adapter operations.
#[derive(Debug, Clone)]
pub struct ProviderError {
    /// The specific error condition
    pub kind: ProviderErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ProviderError {
    /// Create a new ProviderError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ProviderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Provider Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for ProviderError {}
