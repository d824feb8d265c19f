//! Translation between `conduit_core`'s normalized shapes and Anthropic's
//! Messages API wire format. This module is the only place Anthropic's
//! field names appear.

use conduit_core::{
    GenerateRequest, GenerateResponse, Input, MediaSource, Message, Output, Role, StopReason,
    ToolChoice,
};
use conduit_error::{ProviderError, ProviderErrorKind};

use super::types::{
    AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicRequest,
    AnthropicResponse, AnthropicTool, AnthropicToolChoice, AnthropicUsage,
};

pub fn to_request(req: &GenerateRequest, model: &str) -> Result<AnthropicRequest, ProviderError> {
    let messages = req
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(to_message)
        .collect::<Result<Vec<_>, _>>()?;

    let mut builder = AnthropicRequest::builder()
        .model(model.to_string())
        .messages(messages)
        .max_tokens(req.max_tokens.unwrap_or(4096));

    if let Some(system) = &req.system {
        builder = builder.system(system.clone());
    }
    if let Some(temperature) = req.temperature {
        builder = builder.temperature(temperature);
    }
    if !req.tools.is_empty() {
        let tools = req
            .tools
            .iter()
            .map(|t| {
                AnthropicTool::builder()
                    .name(t.name.clone())
                    .description(t.description.clone())
                    .input_schema(t.input_schema.clone())
                    .build()
                    .expect("all AnthropicTool fields set")
            })
            .collect();
        builder = builder.tools(tools);
    }
    if let Some(choice) = &req.tool_choice {
        let mapped = match choice {
            ToolChoice::Auto => AnthropicToolChoice::Auto,
            ToolChoice::None => AnthropicToolChoice::None,
            ToolChoice::Required => AnthropicToolChoice::Any,
            ToolChoice::Specific(name) => AnthropicToolChoice::Tool { name: name.clone() },
        };
        builder = builder.tool_choice(mapped);
    }

    builder
        .build()
        .map_err(|e| ProviderError::new(ProviderErrorKind::InvalidResponse(e.to_string())))
}

fn to_message(message: &Message) -> Result<AnthropicMessage, ProviderError> {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => unreachable!("system messages filtered out before this point"),
    };
    let content = message
        .content
        .iter()
        .map(to_content_block)
        .collect::<Result<Vec<_>, _>>()?;
    AnthropicMessage::builder()
        .role(role.to_string())
        .content(content)
        .build()
        .map_err(|e| ProviderError::new(ProviderErrorKind::InvalidResponse(e.to_string())))
}

fn to_content_block(input: &Input) -> Result<AnthropicContentBlock, ProviderError> {
    Ok(match input {
        Input::Text(text) => AnthropicContentBlock::Text { text: text.clone() },
        Input::Image { mime, source } => {
            let (media_type, data) = base64_source(mime.as_deref(), source)?;
            AnthropicContentBlock::Image {
                source: AnthropicImageSource::builder()
                    .media_type(media_type)
                    .data(data)
                    .build()
                    .map_err(|e| ProviderError::new(ProviderErrorKind::InvalidResponse(e.to_string())))?,
            }
        }
        Input::ToolUse { id, name, arguments } => AnthropicContentBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: arguments.clone(),
        },
        Input::ToolResult {
            tool_call_id,
            content,
            is_error,
        } => AnthropicContentBlock::ToolResult {
            tool_use_id: tool_call_id.clone(),
            content: render_tool_result(content),
            is_error: *is_error,
        },
        other => {
            return Err(ProviderError::new(ProviderErrorKind::Permanent(format!(
                "anthropic adapter does not support input variant {other:?}"
            ))))
        }
    })
}

fn render_tool_result(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn base64_source(
    mime: Option<&str>,
    source: &MediaSource,
) -> Result<(String, String), ProviderError> {
    use base64::Engine;
    let media_type = mime.unwrap_or("application/octet-stream").to_string();
    match source {
        MediaSource::Base64(data) => Ok((media_type, data.clone())),
        MediaSource::Binary(bytes) => {
            Ok((media_type, base64::engine::general_purpose::STANDARD.encode(bytes)))
        }
        MediaSource::Url(_) => Err(ProviderError::new(ProviderErrorKind::Permanent(
            "anthropic requires base64-encoded image data, not URLs".into(),
        ))),
    }
}

pub fn from_response(resp: AnthropicResponse) -> GenerateResponse {
    let mut outputs = Vec::new();
    let mut tool_calls = Vec::new();
    for block in resp.content().clone() {
        match block {
            AnthropicContentBlock::Text { text } => outputs.push(Output::Text(text)),
            AnthropicContentBlock::ToolUse { id, name, input } => {
                let arguments = if input.is_null() {
                    serde_json::json!({})
                } else {
                    input
                };
                tool_calls.push(conduit_core::ToolCall {
                    id,
                    name,
                    arguments,
                });
            }
            _ => {}
        }
    }
    if !tool_calls.is_empty() {
        outputs.push(Output::ToolCalls(dedup_tool_call_ids(tool_calls)));
    }

    let stop_reason = resp.stop_reason().as_deref().map(|s| match s {
        "end_turn" | "stop_sequence" => StopReason::EndTurn,
        "max_tokens" => StopReason::MaxTokens,
        "tool_use" => StopReason::ToolUse,
        _ => StopReason::EndTurn,
    });

    let usage = resp.usage().as_ref().map(|u| {
        conduit_core::TokenUsageData::new(
            *u.input_tokens() as u64,
            *u.output_tokens() as u64,
            (*u.input_tokens() + *u.output_tokens()) as u64,
        )
    });

    GenerateResponse {
        outputs,
        stop_reason,
        usage,
    }
}

/// Anthropic has been observed issuing duplicate `id`s for distinct tool
/// calls within one turn; re-issue fresh ids so downstream tool execution
/// never collides two calls under the same key.
fn dedup_tool_call_ids(calls: Vec<conduit_core::ToolCall>) -> Vec<conduit_core::ToolCall> {
    let mut seen = std::collections::HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if !seen.insert(call.id.clone()) {
                call.id = format!("{}-{}", call.id, uuid::Uuid::new_v4());
            }
            call
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::Input;

    fn request_with(content: Vec<Input>) -> GenerateRequest {
        GenerateRequest {
            messages: vec![Message { role: Role::User, content }],
            system: Some("be terse".into()),
            temperature: Some(0.2),
            ..Default::default()
        }
    }

    #[test]
    fn to_request_carries_system_prompt_and_temperature_separately_from_messages() {
        let req = request_with(vec![Input::Text("hi".into())]);
        let anthropic_req = to_request(&req, "claude-3-5-sonnet").unwrap();
        assert_eq!(anthropic_req.messages().len(), 1);
        assert_eq!(anthropic_req.system().as_deref(), Some("be terse"));
        assert_eq!(*anthropic_req.temperature(), Some(0.2));
    }

    #[test]
    fn to_request_rejects_an_unsupported_input_variant() {
        let req = request_with(vec![Input::Audio { mime: None, source: MediaSource::Binary(vec![1, 2, 3]) }]);
        assert!(to_request(&req, "claude-3-5-sonnet").is_err());
    }

    #[test]
    fn from_response_collects_text_and_tool_use_blocks() {
        let response = AnthropicResponse::builder()
            .id("msg_1")
            .response_type("message")
            .role("assistant")
            .model("claude-3-5-sonnet")
            .content(vec![
                AnthropicContentBlock::Text { text: "thinking...".into() },
                AnthropicContentBlock::ToolUse { id: "call_1".into(), name: "search".into(), input: serde_json::json!({"q": "rust"}) },
            ])
            .stop_reason("tool_use".to_string())
            .usage(AnthropicUsage::builder().input_tokens(10u32).output_tokens(5u32).build().unwrap())
            .build()
            .unwrap();

        let generated = from_response(response);
        assert_eq!(generated.outputs[0], Output::Text("thinking...".into()));
        match &generated.outputs[1] {
            Output::ToolCalls(calls) => {
                assert_eq!(calls[0].name, "search");
                assert_eq!(calls[0].arguments, serde_json::json!({"q": "rust"}));
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
        assert_eq!(generated.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(*generated.usage.unwrap().total_tokens(), 15);
    }

    #[test]
    fn from_response_deduplicates_colliding_tool_call_ids() {
        let response = AnthropicResponse::builder()
            .id("msg_2")
            .response_type("message")
            .role("assistant")
            .model("claude-3-5-sonnet")
            .content(vec![
                AnthropicContentBlock::ToolUse { id: "dup".into(), name: "a".into(), input: serde_json::Value::Null },
                AnthropicContentBlock::ToolUse { id: "dup".into(), name: "b".into(), input: serde_json::Value::Null },
            ])
            .build()
            .unwrap();

        let generated = from_response(response);
        let Output::ToolCalls(calls) = &generated.outputs[0] else { panic!("expected tool calls") };
        assert_ne!(calls[0].id, calls[1].id);
    }
}
