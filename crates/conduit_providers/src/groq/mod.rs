//! Groq exposes an OpenAI-compatible chat completions endpoint, so this
//! adapter is a thin naming wrapper over
//! [`crate::openai_compat::OpenAiCompatibleClient`].

use crate::openai_compat::OpenAiCompatibleClient;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Builds a Groq client for `model`.
pub fn groq_client(model: impl Into<String>, api_key: impl Into<String>) -> OpenAiCompatibleClient {
    OpenAiCompatibleClient::new("groq", model, DEFAULT_BASE_URL, Some(api_key.into()))
}
