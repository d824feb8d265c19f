//! Core data types for the `conduit` MCP orchestration engine.
//!
//! This crate provides the provider-independent, wire-independent types
//! shared across every other crate in the workspace: conversation messages,
//! normalized generation requests/responses, streaming events, and token
//! usage accounting. It also owns process-wide logging initialization.

mod input;
mod media;
mod message;
mod observability;
mod output;
mod request;
mod role;
mod stream_event;
mod token_usage;

pub use input::Input;
pub use media::MediaSource;
pub use message::Message;
pub use observability::init_observability;
pub use output::{Output, StopReason, ToolCall};
pub use request::{GenerateRequest, GenerateResponse, ResponseFormat, ToolChoice, ToolSpec};
pub use role::Role;
pub use stream_event::StreamEvent;
pub use token_usage::TokenUsageData;
