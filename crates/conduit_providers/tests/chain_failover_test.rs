//! Exercises [`ProviderChain`] failover and retry behavior against stub
//! providers, without touching any real vendor API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use conduit_core::{GenerateRequest, GenerateResponse, Output, StreamEvent};
use conduit_error::{ProviderError, ProviderErrorKind};
use conduit_interface::{Provider, ProviderResult};
use conduit_providers::ProviderChain;
use conduit_rate_limit::RetryPolicy;

struct FailingProvider {
    id: &'static str,
    kind: ProviderErrorKind,
    calls: AtomicU32,
}

#[async_trait]
impl Provider for FailingProvider {
    fn id(&self) -> &str {
        self.id
    }
    fn model(&self) -> &str {
        "stub"
    }
    async fn generate(&self, _request: &GenerateRequest) -> ProviderResult<GenerateResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::new(self.kind.clone()))
    }
    async fn stream(&self, _request: GenerateRequest) -> ProviderResult<BoxStream<'static, ProviderResult<StreamEvent>>> {
        unimplemented!()
    }
}

struct SucceedingProvider {
    id: &'static str,
}

#[async_trait]
impl Provider for SucceedingProvider {
    fn id(&self) -> &str {
        self.id
    }
    fn model(&self) -> &str {
        "stub"
    }
    async fn generate(&self, _request: &GenerateRequest) -> ProviderResult<GenerateResponse> {
        Ok(GenerateResponse { outputs: vec![Output::Text("ok".into())], stop_reason: None, usage: None })
    }
    async fn stream(&self, _request: GenerateRequest) -> ProviderResult<BoxStream<'static, ProviderResult<StreamEvent>>> {
        unimplemented!()
    }
}

#[tokio::test]
async fn a_permanent_error_aborts_the_chain_without_failing_over() {
    let primary = Arc::new(FailingProvider {
        id: "primary",
        kind: ProviderErrorKind::Permanent("bad api key".into()),
        calls: AtomicU32::new(0),
    });
    let secondary = Arc::new(SucceedingProvider { id: "secondary" });
    let chain = ProviderChain::new(vec![primary.clone(), secondary], RetryPolicy::new(3));

    let result = chain.generate(&GenerateRequest::default(), &CancellationToken::new()).await;
    assert!(
        matches!(result.unwrap_err().kind, ProviderErrorKind::Permanent(_)),
        "a permanent condition must abort the step, not fail over to the next provider"
    );
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1, "a permanent error must not be retried against the same provider");
}

#[tokio::test]
async fn a_retryable_error_retries_the_same_provider_up_to_the_policy_budget() {
    let flaky = Arc::new(FailingProvider { id: "flaky", kind: ProviderErrorKind::Timeout, calls: AtomicU32::new(0) });
    let chain = ProviderChain::new(vec![flaky.clone()], RetryPolicy::new(3));

    let result = chain.generate(&GenerateRequest::default(), &CancellationToken::new()).await;
    assert!(result.is_err());
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3, "retry budget is per-provider attempts, not failover hops");
}

#[tokio::test]
async fn a_retryable_error_fails_over_once_its_retry_budget_is_spent() {
    let flaky = Arc::new(FailingProvider { id: "flaky", kind: ProviderErrorKind::Timeout, calls: AtomicU32::new(0) });
    let secondary = Arc::new(SucceedingProvider { id: "secondary" });
    let chain = ProviderChain::new(vec![flaky.clone(), secondary], RetryPolicy::new(2));

    let response = chain.generate(&GenerateRequest::default(), &CancellationToken::new()).await.unwrap();
    assert_eq!(response.outputs, vec![Output::Text("ok".into())]);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 2, "exhausting the retry budget must advance to the next provider");
}

#[tokio::test]
async fn an_exhausted_chain_reports_chain_exhausted() {
    let a = Arc::new(FailingProvider { id: "a", kind: ProviderErrorKind::Timeout, calls: AtomicU32::new(0) });
    let b = Arc::new(FailingProvider { id: "b", kind: ProviderErrorKind::Timeout, calls: AtomicU32::new(0) });
    let chain = ProviderChain::new(vec![a, b], RetryPolicy::new(1));

    let result = chain.generate(&GenerateRequest::default(), &CancellationToken::new()).await;
    assert!(matches!(result.unwrap_err().kind, ProviderErrorKind::ChainExhausted(_)));
}

#[tokio::test]
async fn an_empty_chain_fails_immediately_without_calling_anything() {
    let chain = ProviderChain::new(Vec::new(), RetryPolicy::new(3));
    let result = chain.generate(&GenerateRequest::default(), &CancellationToken::new()).await;
    assert!(matches!(result.unwrap_err().kind, ProviderErrorKind::ChainExhausted(_)));
}
