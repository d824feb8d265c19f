//! Per-server circuit breaker and exponential-backoff retry, guarding a
//! downstream MCP server from repeated calls while it is unhealthy.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use conduit_error::DownstreamError;

/// Backoff schedule for retrying a downstream call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Tracks one downstream server's recent call health and trips open after
/// `failure_threshold` consecutive failures, matching spec.md §4.J's
/// resilience requirement for downstream connections.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_threshold: usize,
    failure_count: usize,
    success_threshold: usize,
    success_count: usize,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: usize, success_threshold: usize) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_threshold,
            failure_count: 0,
            success_threshold,
            success_count: 0,
        }
    }

    #[instrument(skip(self))]
    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => self.failure_count = 0,
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.success_threshold {
                    debug!("circuit breaker closing after successful recovery");
                    self.state = CircuitState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                }
            }
            CircuitState::Open => {
                self.state = CircuitState::Closed;
                self.failure_count = 0;
            }
        }
    }

    #[instrument(skip(self))]
    pub fn record_failure(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.failure_threshold {
                    warn!(failures = self.failure_count, "circuit breaker opening");
                    self.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!("circuit breaker reopening after failure in half-open state");
                self.state = CircuitState::Open;
                self.failure_count = self.failure_threshold;
                self.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Allows a half-open trial request through after the breaker has been
    /// open for a cooldown period; the caller decides when that period has
    /// elapsed and calls this before attempting the call.
    pub fn try_reset(&mut self) {
        if self.state == CircuitState::Open {
            debug!("circuit breaker entering half-open state");
            self.state = CircuitState::HalfOpen;
            self.success_count = 0;
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, CircuitState::Closed | CircuitState::HalfOpen)
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }
}

/// Retries `operation` with exponential backoff up to `config.max_attempts`.
/// Every downstream failure is treated as retryable except the last attempt,
/// which is returned as-is.
#[instrument(skip(config, operation))]
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T, DownstreamError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, DownstreamError>>,
{
    let mut attempt = 0;
    let mut backoff = config.initial_backoff;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "downstream call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= config.max_attempts {
                    warn!(attempt, "downstream retry attempts exhausted");
                    return Err(err);
                }
                debug!(attempt, backoff_ms = backoff.as_millis(), "retrying downstream call");
                sleep(backoff).await;
                backoff = std::cmp::min(
                    Duration::from_secs_f64(backoff.as_secs_f64() * config.backoff_multiplier),
                    config.max_backoff,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let mut cb = CircuitBreaker::new(2, 1);
        assert!(cb.is_closed());
        cb.record_failure();
        assert!(cb.is_closed());
        cb.record_failure();
        assert!(!cb.is_closed());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_recovers_on_success() {
        let mut cb = CircuitBreaker::new(1, 1);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.try_reset();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_reopens_on_failure() {
        let mut cb = CircuitBreaker::new(1, 2);
        cb.record_failure();
        cb.try_reset();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
