//! Drives a provider HTTP call through the retry/backoff schedule,
//! cooperatively cancellable via a [`CancellationToken`].

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use conduit_error::{ProviderError, ProviderErrorKind};

use crate::backoff::RetryPolicy;

/// Runs `op` up to `policy.max_attempts()` times, waiting the policy's
/// backoff delay between attempts. Stops immediately on a non-retryable
/// error or on cancellation.
#[instrument(skip(policy, cancellation, op))]
pub async fn retry_provider_call<T, F, Fut>(
    policy: &RetryPolicy,
    cancellation: &CancellationToken,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if cancellation.is_cancelled() {
            return Err(ProviderError::new(ProviderErrorKind::Timeout));
        }

        let result = op(attempt).await;
        match result {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.kind.is_retryable();
                if !retryable || attempt >= policy.max_attempts() {
                    return Err(err);
                }
                let retry_after = match &err.kind {
                    ProviderErrorKind::RateLimited {
                        retry_after_secs: Some(secs),
                    } => Some(Duration::from_secs(*secs)),
                    _ => None,
                };
                let delay = policy.delay_for(attempt, retry_after);
                warn!(attempt, ?delay, error = %err, "retrying provider call");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancellation.cancelled() => {
                        return Err(ProviderError::new(ProviderErrorKind::Timeout));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let policy = RetryPolicy::new(5);
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result = retry_provider_call(&policy, &token, |_attempt| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::new(ProviderErrorKind::Timeout))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_do_not_retry() {
        let policy = RetryPolicy::new(5);
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result: Result<(), ProviderError> = retry_provider_call(&policy, &token, |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::new(ProviderErrorKind::Permanent("bad key".into()))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
