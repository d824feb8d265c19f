//! Anthropic Messages API request and response types.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Anthropic API request.
#[derive(Debug, Clone, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), pattern = "owned")]
pub struct AnthropicRequest {
    /// Model identifier
    model: String,
    /// List of messages
    messages: Vec<AnthropicMessage>,
    /// Maximum tokens to generate
    max_tokens: u32,
    /// Optional system prompt
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Optional temperature
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Tools the model may call
    #[builder(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
    /// Tool choice directive
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<AnthropicToolChoice>,
}

impl AnthropicRequest {
    /// Creates a builder for `AnthropicRequest`.
    pub fn builder() -> AnthropicRequestBuilder {
        AnthropicRequestBuilder::default()
    }
}

/// A tool definition in Anthropic's schema.
#[derive(Debug, Clone, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), pattern = "owned")]
pub struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

impl AnthropicTool {
    /// Creates a builder for `AnthropicTool`.
    pub fn builder() -> AnthropicToolBuilder {
        AnthropicToolBuilder::default()
    }
}

/// Anthropic's `tool_choice` directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicToolChoice {
    /// Model decides
    Auto,
    /// Model must call some tool
    Any,
    /// Model must not call a tool
    None,
    /// Model must call exactly this tool
    Tool {
        /// Tool name
        name: String,
    },
}

/// Anthropic message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), pattern = "owned")]
pub struct AnthropicMessage {
    /// Role of the message sender
    role: String,
    /// Content blocks
    content: Vec<AnthropicContentBlock>,
}

impl AnthropicMessage {
    /// Creates a builder for `AnthropicMessage`.
    pub fn builder() -> AnthropicMessageBuilder {
        AnthropicMessageBuilder::default()
    }
}

/// Content block in an Anthropic message, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    /// Text content
    Text {
        /// Text content
        text: String,
    },
    /// Image content
    Image {
        /// Image source
        source: AnthropicImageSource,
    },
    /// A tool call the model made (appears in responses, echoed back as
    /// history on the next turn)
    ToolUse {
        /// Tool call id
        id: String,
        /// Tool name
        name: String,
        /// Tool arguments
        input: serde_json::Value,
    },
    /// The result of a tool call (sent back to the model as a user-role
    /// message following a `ToolUse` block)
    ToolResult {
        /// Id of the `ToolUse` block this answers
        tool_use_id: String,
        /// Tool output, rendered as text
        content: String,
        /// Whether the tool invocation itself failed
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

/// Image source for Anthropic API.
#[derive(Debug, Clone, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), pattern = "owned")]
pub struct AnthropicImageSource {
    /// Source type (always "base64")
    #[builder(default = "\"base64\".to_string()")]
    r#type: String,
    /// Media type
    media_type: String,
    /// Base64-encoded image data
    data: String,
}

impl AnthropicImageSource {
    /// Creates a builder for `AnthropicImageSource`.
    pub fn builder() -> AnthropicImageSourceBuilder {
        AnthropicImageSourceBuilder::default()
    }
}

/// Anthropic API response.
#[derive(Debug, Clone, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), pattern = "owned")]
pub struct AnthropicResponse {
    /// Response ID
    id: String,
    /// Response type
    #[serde(rename = "type")]
    response_type: String,
    /// Role (should be "assistant")
    role: String,
    /// Content blocks
    content: Vec<AnthropicContentBlock>,
    /// Model used
    model: String,
    /// Stop reason
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_reason: Option<String>,
    /// Usage information
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<AnthropicUsage>,
}

impl AnthropicResponse {
    /// Creates a builder for `AnthropicResponse`.
    pub fn builder() -> AnthropicResponseBuilder {
        AnthropicResponseBuilder::default()
    }
}

/// Usage information from Anthropic API.
#[derive(Debug, Clone, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), pattern = "owned")]
pub struct AnthropicUsage {
    /// Input tokens
    input_tokens: u32,
    /// Output tokens
    output_tokens: u32,
}

impl AnthropicUsage {
    /// Creates a builder for `AnthropicUsage`.
    pub fn builder() -> AnthropicUsageBuilder {
        AnthropicUsageBuilder::default()
    }
}

/// Body of an Anthropic API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicErrorBody {
    pub error: AnthropicErrorDetail,
}

/// The `error` object inside an Anthropic error response.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}
