//! A local Ollama server speaks the same OpenAI-compatible chat completions
//! wire format under `/v1`, so this adapter is a thin naming wrapper over
//! [`crate::openai_compat::OpenAiCompatibleClient`].

use crate::openai_compat::OpenAiCompatibleClient;

const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1/chat/completions";

/// Builds a client for a local (or remote) Ollama server running `model`.
/// Ollama requires no API key by default.
pub fn ollama_client(model: impl Into<String>, base_url: Option<String>) -> OpenAiCompatibleClient {
    OpenAiCompatibleClient::new(
        "ollama",
        model,
        base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        None,
    )
}
