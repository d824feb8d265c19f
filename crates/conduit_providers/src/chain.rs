//! Ordered failover across a list of providers.
//!
//! A step's `execution.providers` list is tried in order: a retryable
//! condition (5xx, timeout, explicit rate limit) is retried against the
//! same provider per [`conduit_rate_limit::RetryPolicy`]; once that budget
//! is spent, and the condition is `should_failover`-tagged, the chain
//! advances to the next provider. A `Permanent`-classified condition (bad
//! API key, model not found, a non-429 4xx) is not failover-eligible and
//! aborts the whole chain immediately, per spec.md §4.E's retry
//! classification table. The chain itself otherwise fails only once every
//! provider has been tried.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use conduit_core::{GenerateRequest, GenerateResponse};
use conduit_error::{ProviderError, ProviderErrorKind};
use conduit_interface::{Provider, ProviderResult};
use conduit_rate_limit::{retry_provider_call, RetryPolicy};

/// An ordered, failover-capable group of providers backing one workflow step.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn Provider>>,
    retry_policy: RetryPolicy,
}

impl ProviderChain {
    /// Builds a chain from an ordered provider list. `providers` must be
    /// non-empty; an empty chain can never produce a response.
    pub fn new(providers: Vec<Arc<dyn Provider>>, retry_policy: RetryPolicy) -> Self {
        Self {
            providers,
            retry_policy,
        }
    }

    /// The provider ids in failover order, for tracing/diagnostics.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Runs `request` against the chain, advancing on failover-eligible
    /// failures until one provider succeeds or the chain is exhausted.
    #[instrument(skip(self, request, cancellation))]
    pub async fn generate(
        &self,
        request: &GenerateRequest,
        cancellation: &CancellationToken,
    ) -> ProviderResult<GenerateResponse> {
        if self.providers.is_empty() {
            return Err(ProviderError::new(ProviderErrorKind::ChainExhausted(
                "no providers configured".into(),
            )));
        }

        let mut last_err: Option<ProviderError> = None;
        for provider in &self.providers {
            let result = retry_provider_call(&self.retry_policy, cancellation, |_attempt| {
                let provider = provider.clone();
                let request = request.clone();
                async move { provider.generate(&request).await }
            })
            .await;

            match result {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if !err.kind.should_failover() {
                        warn!(provider = provider.id(), error = %err, "permanent provider failure, aborting chain without failover");
                        return Err(err);
                    }
                    warn!(provider = provider.id(), error = %err, "provider failed, advancing chain");
                    last_err = Some(err);
                }
            }
        }

        Err(ProviderError::new(ProviderErrorKind::ChainExhausted(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "all providers failed".into()),
        )))
    }
}
