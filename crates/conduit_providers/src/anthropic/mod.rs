mod client;
mod conversions;
mod types;

pub use client::AnthropicClient;
pub use types::{
    AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicMessageBuilder,
    AnthropicRequest, AnthropicRequestBuilder, AnthropicResponse, AnthropicResponseBuilder,
    AnthropicTool, AnthropicToolChoice, AnthropicUsage,
};
