//! Generic OpenAI-compatible chat completions client, shared by every
//! adapter whose vendor speaks that wire format rather than its own.

mod client;
mod conversions;
mod dto;

pub use client::OpenAiCompatibleClient;
pub use conversions::normalize_tool_calls;
pub use dto::{ChatMessage, ChatRequest, ChatResponse, ToolCallDto, ToolDefDto};
