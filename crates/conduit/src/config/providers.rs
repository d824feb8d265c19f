//! Loads `providers/*.yaml` into a [`ProviderRegistry`] (spec §6
//! "Configuration layout"). Each file names one vendor adapter; `kind`
//! selects which `conduit_providers` constructor builds it, and every
//! vendor-specific field name stays confined to this module plus the
//! adapter itself, per spec §4.E.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use conduit_error::ConfigError;
use conduit_interface::Provider;
use conduit_providers::{groq_client, huggingface_client, ollama_client, AnthropicClient, GeminiClient, OpenAiCompatibleClient};
use conduit_rate_limit::RetryPolicy;
use conduit_workflow::ProviderRegistry;

use super::env_interp::interpolate;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ProviderKind {
    Anthropic,
    Gemini,
    OpenaiCompat,
    Ollama,
    Groq,
    Huggingface,
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderDoc {
    id: String,
    kind: ProviderKind,
    model: String,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

fn build_provider(doc: ProviderDoc) -> Result<Arc<dyn Provider>, ConfigError> {
    let api_key = doc.api_key.as_deref().map(interpolate);
    let base_url = doc.base_url.as_deref().map(interpolate);

    let provider: Arc<dyn Provider> = match doc.kind {
        ProviderKind::Anthropic => {
            let key = api_key.ok_or_else(|| ConfigError::new(format!("provider '{}': anthropic requires api_key", doc.id)))?;
            let mut client = AnthropicClient::new(doc.id.clone(), doc.model, key);
            if let Some(url) = base_url {
                client = client.with_base_url(url);
            }
            Arc::new(client)
        }
        ProviderKind::Gemini => {
            let key = api_key.ok_or_else(|| ConfigError::new(format!("provider '{}': gemini requires api_key", doc.id)))?;
            let mut client = GeminiClient::new(doc.id.clone(), doc.model, key);
            if let Some(url) = base_url {
                client = client.with_base_url(url);
            }
            Arc::new(client)
        }
        ProviderKind::OpenaiCompat => {
            let url = base_url.ok_or_else(|| ConfigError::new(format!("provider '{}': openai_compat requires base_url", doc.id)))?;
            Arc::new(OpenAiCompatibleClient::new(doc.id.clone(), doc.model, url, api_key))
        }
        ProviderKind::Ollama => Arc::new(ollama_client(doc.model, base_url)),
        ProviderKind::Groq => {
            let key = api_key.ok_or_else(|| ConfigError::new(format!("provider '{}': groq requires api_key", doc.id)))?;
            Arc::new(groq_client(doc.model, key))
        }
        ProviderKind::Huggingface => {
            let key = api_key.ok_or_else(|| ConfigError::new(format!("provider '{}': huggingface requires api_key", doc.id)))?;
            Arc::new(huggingface_client(doc.model, key))
        }
    };
    Ok(provider)
}

/// Walks `dir` for `*.yaml`/`*.yml` provider documents, builds one adapter
/// per document, and returns them wrapped in a [`ProviderRegistry`] using
/// `retry_attempts` as the per-provider retry budget before a step's
/// failover chain advances to the next provider id (spec §4.E/§4.F).
pub fn load_provider_registry<P: AsRef<Path>>(dir: P, retry_attempts: u32) -> Result<ProviderRegistry, ConfigError> {
    let dir = dir.as_ref();
    let mut providers = Vec::new();
    if !dir.is_dir() {
        return Ok(ProviderRegistry::new(providers, RetryPolicy::new(retry_attempts)));
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| ConfigError::new(format!("{}: {e}", dir.display())))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")))
        .collect();
    paths.sort();

    for path in paths {
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::new(format!("{}: {e}", path.display())))?;
        let doc: ProviderDoc = serde_yaml::from_str(&content).map_err(|e| ConfigError::new(format!("{}: {e}", path.display())))?;
        providers.push(build_provider(doc)?);
    }

    Ok(ProviderRegistry::new(providers, RetryPolicy::new(retry_attempts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_an_ollama_provider_with_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "id: local\nkind: ollama\nmodel: llama3").unwrap();

        let registry = load_provider_registry(dir.path(), 3).unwrap();
        assert!(registry.get("local").is_some());
    }

    #[test]
    fn interpolates_api_key_from_environment() {
        std::env::set_var("CONDUIT_TEST_ANTHROPIC_KEY", "sk-test-123");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anthropic.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "id: anthropic-main\nkind: anthropic\nmodel: claude-3-5-sonnet\napi_key: \"${{CONDUIT_TEST_ANTHROPIC_KEY}}\""
        )
        .unwrap();

        let registry = load_provider_registry(dir.path(), 3).unwrap();
        assert!(registry.get("anthropic-main").is_some());
        std::env::remove_var("CONDUIT_TEST_ANTHROPIC_KEY");
    }

    #[test]
    fn empty_directory_yields_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = load_provider_registry(dir.path(), 3).unwrap();
        assert!(registry.get("anything").is_none());
    }
}
