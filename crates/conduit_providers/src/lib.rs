//! Vendor-specific adapters implementing `conduit_interface::Provider`,
//! plus the failover chain that ties an ordered provider list together.
//!
//! Every vendor-specific field name is confined to its own module; the
//! rest of the workspace only ever sees `conduit_core`'s normalized
//! request/response shapes.

pub mod anthropic;
pub mod chain;
pub mod gemini;
pub mod groq;
pub mod huggingface;
pub mod ollama;
pub mod openai_compat;

pub use anthropic::AnthropicClient;
pub use chain::ProviderChain;
pub use gemini::GeminiClient;
pub use groq::groq_client;
pub use huggingface::huggingface_client;
pub use ollama::ollama_client;
pub use openai_compat::OpenAiCompatibleClient;
