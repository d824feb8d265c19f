//! The `Provider` trait: one normalized seam every LLM backend adapter
//! implements, so the workflow executor never branches on vendor.

use async_trait::async_trait;
use conduit_core::{GenerateRequest, GenerateResponse, StreamEvent};
use conduit_error::ProviderError;
use futures_util::stream::BoxStream;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A single LLM backend (OpenAI-compatible, Anthropic, Gemini, Ollama, ...).
///
/// Implementors normalize their wire format at the edges: `generate` and
/// `stream` both take/return the same `conduit_core` types regardless of
/// which vendor API backs them.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used in provider registry lookups and failover chains
    fn id(&self) -> &str;

    /// Model name this provider instance targets
    fn model(&self) -> &str;

    /// Issue one non-streaming generation call.
    async fn generate(&self, request: &GenerateRequest) -> ProviderResult<GenerateResponse>;

    /// Issue a streaming generation call. The returned stream is lazy,
    /// finite, and not restartable: dropping it mid-stream cancels the
    /// underlying request where the transport supports it.
    async fn stream(
        &self,
        request: GenerateRequest,
    ) -> ProviderResult<BoxStream<'static, ProviderResult<StreamEvent>>>;
}
