//! Data transfer objects for OpenAI-compatible chat completion APIs
//! (OpenAI itself, Groq, HuggingFace's router, and local OpenAI-compatible
//! servers such as Ollama's `/v1` endpoint).

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// A message in the OpenAI chat format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatMessage {
    /// Role: "system", "user", "assistant", or "tool"
    pub role: String,
    /// Message content. `None` for an assistant message that is pure
    /// tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls the assistant made this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDto>,
    /// Id of the tool call this message answers (role == "tool")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// One tool call in OpenAI's `tool_calls` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDto {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCallDto,
}

fn function_type() -> String {
    "function".to_string()
}

/// The `function` object inside a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallDto {
    pub name: String,
    /// JSON-encoded arguments. OpenAI-family APIs send/accept this as a
    /// string, never a nested object.
    #[serde(default)]
    pub arguments: String,
}

/// A tool definition in OpenAI's `tools` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefDto {
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionDefDto,
}

/// The `function` object inside a tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefDto {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// OpenAI chat completion request.
#[derive(Debug, Clone, Serialize, Builder)]
#[builder(setter(into))]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Enable streaming
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tools the model may call
    #[builder(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefDto>,
    /// Tool choice directive, passed through as the raw OpenAI shape
    /// (`"auto"`, `"none"`, `"required"`, or `{"type":"function",...}`)
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Requested response shape, passed through as OpenAI's `response_format`
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Creates a new builder for ChatRequest.
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::default()
    }
}

/// A choice in the OpenAI response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// The message content
    pub message: ChatMessage,
    /// Reason for finishing
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: Option<usize>,
    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: Option<usize>,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: Option<usize>,
}

/// OpenAI chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Response choices
    pub choices: Vec<ChatChoice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

/// One delta in a streamed OpenAI chat completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamChunk {
    pub choices: Vec<ChatStreamChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamChoice {
    pub delta: ChatStreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatStreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDeltaDto>,
}

/// A streamed tool call fragment. Chunks for the same `index` accumulate
/// into one call; `id`/`name` typically only appear on the first chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallDeltaDto {
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionCallDeltaDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionCallDeltaDto {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}
