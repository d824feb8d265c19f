//! Request and response types for LLM generation.

use crate::{Message, Output, StopReason, TokenUsageData};
use serde::{Deserialize, Serialize};

/// A tool the model may call, described the way every provider adapter
/// translates into its own wire schema (OpenAI `function`, Anthropic
/// `tool`, Gemini `functionDeclaration`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name, passed back verbatim in `ToolCall::name`
    pub name: String,
    /// Human-readable description shown to the model
    pub description: String,
    /// JSON Schema describing the tool's arguments
    pub input_schema: serde_json::Value,
}

/// Controls whether/which tool the model should call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Let the model decide (default when `tools` is non-empty)
    #[default]
    Auto,
    /// Never call a tool
    None,
    /// Call some tool
    Required,
    /// Call exactly this named tool
    Specific(String),
}

/// Requests a specific shape for the model's text output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free-form text (default)
    Text,
    /// Valid JSON, unconstrained shape
    JsonObject,
    /// JSON constrained to the given JSON Schema
    JsonSchema {
        /// Schema name, passed through to providers that require one
        name: String,
        /// The schema itself
        schema: serde_json::Value,
    },
}

/// Generic generation request (multimodal-safe, provider-independent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GenerateRequest {
    /// Conversation so far, oldest first
    pub messages: Vec<Message>,
    /// System prompt, kept separate from `messages` since several providers
    /// (Anthropic, Gemini) take it out-of-band rather than as a message
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub model: Option<String>,
    /// Tools the model may call this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    /// How the model should choose among `tools`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Request an incremental `StreamEvent` sequence instead of one response
    #[serde(default)]
    pub stream: bool,
    /// Requested output shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// The unified response object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub outputs: Vec<Output>,
    /// Why generation stopped, when the provider reports it
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    /// Token accounting, when the provider reports it
    #[serde(default)]
    pub usage: Option<TokenUsageData>,
}
