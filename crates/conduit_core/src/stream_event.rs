//! Streaming response events.
//!
//! A provider's streaming call produces a lazy, finite, non-restartable
//! sequence of these events. Consumers fold them into the same `Output`
//! shape a non-streaming call would have returned by the time
//! `MessageEnd` arrives.

use crate::TokenUsageData;
use serde::{Deserialize, Serialize};

/// One event in a provider's streamed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StreamEvent {
    /// An incremental chunk of generated text
    DeltaText(String),
    /// The model started a tool call
    ToolUseBegin {
        /// Tool call id, stable for the rest of this call
        id: String,
        /// Tool name
        name: String,
    },
    /// An incremental chunk of a tool call's JSON arguments
    ToolUseArgsDelta {
        /// Id of the tool call this chunk belongs to
        id: String,
        /// Partial JSON text; concatenate all deltas for a given id, then parse
        partial_json: String,
    },
    /// A tool call finished accumulating arguments
    ToolUseEnd {
        /// Id of the completed tool call
        id: String,
    },
    /// The stream is complete; carries final usage accounting if the provider reports it
    MessageEnd {
        /// Why the generation stopped
        stop_reason: Option<crate::StopReason>,
        /// Token usage for the whole call, if the provider reports it
        usage: Option<TokenUsageData>,
    },
}
