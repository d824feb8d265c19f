//! Maps the provider id strings a workflow's YAML names to the concrete
//! [`Provider`] instances the host process wired up at startup, and builds
//! the [`ProviderChain`] a step's execution actually runs against.
//!
//! Instantiating providers themselves (API keys, base URLs) is the host
//! binary's job; this registry only holds what it's handed.

use std::collections::HashMap;
use std::sync::Arc;

use conduit_error::{WorkflowError, WorkflowErrorKind};
use conduit_interface::Provider;
use conduit_providers::ProviderChain;
use conduit_rate_limit::RetryPolicy;

/// Looks up configured providers by id to assemble per-step failover chains.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    retry_policy: RetryPolicy,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn Provider>>, retry_policy: RetryPolicy) -> Self {
        Self { providers: providers.into_iter().map(|p| (p.id().to_string(), p)).collect(), retry_policy }
    }

    /// Builds an ordered [`ProviderChain`] from `ids`. Every id must resolve;
    /// an unknown provider id is treated the same as any other undefined
    /// reference a workflow can make.
    pub fn chain(&self, ids: &[String]) -> Result<ProviderChain, WorkflowError> {
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            let provider = self
                .providers
                .get(id)
                .ok_or_else(|| WorkflowError::new(WorkflowErrorKind::UndefinedReference(id.clone())))?;
            resolved.push(provider.clone());
        }
        Ok(ProviderChain::new(resolved, self.retry_policy))
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_core::{GenerateRequest, GenerateResponse, StreamEvent};
    use conduit_interface::ProviderResult;
    use futures_util::stream::BoxStream;

    struct StubProvider(&'static str);

    #[async_trait]
    impl Provider for StubProvider {
        fn id(&self) -> &str {
            self.0
        }
        fn model(&self) -> &str {
            "stub"
        }
        async fn generate(&self, _request: &GenerateRequest) -> ProviderResult<GenerateResponse> {
            unimplemented!()
        }
        async fn stream(
            &self,
            _request: GenerateRequest,
        ) -> ProviderResult<BoxStream<'static, ProviderResult<StreamEvent>>> {
            unimplemented!()
        }
    }

    #[test]
    fn resolves_known_ids_in_order() {
        let registry = ProviderRegistry::new(
            vec![Arc::new(StubProvider("a")), Arc::new(StubProvider("b"))],
            RetryPolicy::default(),
        );
        let chain = registry.chain(&["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(chain.provider_ids(), vec!["b", "a"]);
    }

    #[test]
    fn rejects_unknown_ids() {
        let registry = ProviderRegistry::new(vec![Arc::new(StubProvider("a"))], RetryPolicy::default());
        assert!(registry.chain(&["missing".to_string()]).is_err());
    }
}
