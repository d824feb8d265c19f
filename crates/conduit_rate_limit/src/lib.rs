//! The HTTP client core (spec component F): one pooled [`reqwest::Client`]
//! per provider base URL, a fixed exponential-backoff retry schedule, and
//! cooperative cancellation. `conduit_providers` adapters sit on top of
//! this crate rather than constructing their own HTTP clients.

mod backoff;
mod pool;
mod retry;

pub use backoff::RetryPolicy;
pub use pool::HttpClientPool;
pub use retry::retry_provider_call;
