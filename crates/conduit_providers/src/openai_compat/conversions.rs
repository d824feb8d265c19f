//! Translation between `conduit_core`'s normalized shapes and the OpenAI
//! chat completions wire format.

use std::collections::HashMap;

use conduit_core::{
    GenerateRequest, GenerateResponse, Input, Message, Output, Role, StopReason, ToolCall,
    ToolChoice,
};
use conduit_error::{ProviderError, ProviderErrorKind};

use super::dto::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChatStreamChunk, FunctionCallDto,
    FunctionDefDto, ToolCallDto, ToolDefDto,
};

/// Converts a normalized [`GenerateRequest`] to the OpenAI chat format.
pub fn to_chat_request(req: &GenerateRequest, model: &str) -> Result<ChatRequest, ProviderError> {
    let mut messages = Vec::new();

    if let Some(system) = &req.system {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: Some(system.clone()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        });
    }

    for msg in &req.messages {
        messages.push(to_chat_message(msg)?);
    }

    let mut builder = ChatRequest::builder();
    builder.model(model.to_string()).messages(messages);

    if let Some(max_tokens) = req.max_tokens {
        builder.max_tokens(max_tokens);
    }
    if let Some(temp) = req.temperature {
        builder.temperature(temp);
    }
    if req.stream {
        builder.stream(true);
    }
    if !req.tools.is_empty() {
        let tools = req
            .tools
            .iter()
            .map(|t| ToolDefDto {
                kind: "function".to_string(),
                function: FunctionDefDto {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect();
        builder.tools(tools);
    }
    if let Some(choice) = &req.tool_choice {
        let value = match choice {
            ToolChoice::Auto => serde_json::json!("auto"),
            ToolChoice::None => serde_json::json!("none"),
            ToolChoice::Required => serde_json::json!("required"),
            ToolChoice::Specific(name) => {
                serde_json::json!({ "type": "function", "function": { "name": name } })
            }
        };
        builder.tool_choice(value);
    }

    builder
        .build()
        .map_err(|e| ProviderError::new(ProviderErrorKind::InvalidResponse(e.to_string())))
}

fn to_chat_message(msg: &Message) -> Result<ChatMessage, ProviderError> {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    };

    // A user message consisting solely of one ToolResult becomes a
    // dedicated "tool" role message; everything else collapses its text
    // parts into one content string (OpenAI-compatible APIs don't accept
    // the same multi-block content shape Anthropic does).
    if let [Input::ToolResult {
        tool_call_id,
        content,
        ..
    }] = msg.content.as_slice()
    {
        let rendered = match content {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Ok(ChatMessage {
            role: "tool".to_string(),
            content: Some(rendered),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.clone()),
        });
    }

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for input in &msg.content {
        match input {
            Input::Text(t) => {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(t);
            }
            Input::ToolUse { id, name, arguments } => tool_calls.push(ToolCallDto {
                id: id.clone(),
                kind: "function".to_string(),
                function: FunctionCallDto {
                    name: name.clone(),
                    arguments: arguments.to_string(),
                },
            }),
            other => {
                return Err(ProviderError::new(ProviderErrorKind::Permanent(format!(
                    "openai-compatible adapter does not support input variant {other:?} inline in a message"
                ))))
            }
        }
    }

    Ok(ChatMessage {
        role: role.to_string(),
        content: if text.is_empty() { None } else { Some(text) },
        tool_calls,
        tool_call_id: None,
    })
}

/// Converts an OpenAI chat response to a normalized [`GenerateResponse`].
pub fn from_chat_response(response: ChatResponse) -> Result<GenerateResponse, ProviderError> {
    let choice: ChatChoice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::new(ProviderErrorKind::InvalidResponse("no choices in response".into())))?;

    let mut outputs = Vec::new();
    if let Some(text) = choice.message.content {
        if !text.is_empty() {
            outputs.push(Output::Text(text));
        }
    }
    if !choice.message.tool_calls.is_empty() {
        outputs.push(Output::ToolCalls(normalize_tool_calls(choice.message.tool_calls)));
    }

    let stop_reason = choice.finish_reason.as_deref().map(|r| match r {
        "length" => StopReason::MaxTokens,
        "tool_calls" => StopReason::ToolUse,
        "stop_sequence" => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    });

    let usage = response.usage.and_then(|u| {
        match (u.prompt_tokens, u.completion_tokens, u.total_tokens) {
            (Some(input), Some(output), Some(total)) => {
                Some(conduit_core::TokenUsageData::new(input as u64, output as u64, total as u64))
            }
            _ => None,
        }
    });

    Ok(GenerateResponse {
        outputs,
        stop_reason,
        usage,
    })
}

/// Maps wire tool calls to the normalized shape, fixing up the documented
/// vendor quirk where empty/null argument strings are sent instead of
/// `"{}"`, and re-issuing ids that collide within one turn.
pub fn normalize_tool_calls(calls: Vec<ToolCallDto>) -> Vec<ToolCall> {
    let mut seen = HashMap::new();
    calls
        .into_iter()
        .map(|call| {
            let arguments = if call.function.arguments.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| serde_json::json!({}))
            };
            let count = seen.entry(call.id.clone()).or_insert(0);
            let id = if *count == 0 {
                call.id.clone()
            } else {
                format!("{}-{}", call.id, count)
            };
            *count += 1;
            ToolCall {
                id,
                name: call.function.name,
                arguments,
            }
        })
        .collect()
}

/// Accumulates a finished streaming response's fragments into a
/// [`GenerateResponse`], used by tests and any caller that wants the
/// folded value rather than the live event sequence.
pub fn fold_stream_chunk(into: &mut GenerateResponse, chunk: ChatStreamChunk) {
    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(text) = choice.delta.content {
            match into.outputs.last_mut() {
                Some(Output::Text(existing)) => existing.push_str(&text),
                _ => into.outputs.push(Output::Text(text)),
            }
        }
    }
    if let Some(usage) = chunk.usage {
        if let (Some(input), Some(output), Some(total)) =
            (usage.prompt_tokens, usage.completion_tokens, usage.total_tokens)
        {
            into.usage = Some(conduit_core::TokenUsageData::new(
                input as u64,
                output as u64,
                total as u64,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(messages: Vec<Message>) -> GenerateRequest {
        GenerateRequest {
            messages,
            system: Some("be terse".into()),
            temperature: Some(0.3),
            ..Default::default()
        }
    }

    #[test]
    fn to_chat_request_prepends_a_system_message_from_the_system_field() {
        let req = request_with(vec![Message { role: Role::User, content: vec![Input::Text("hi".into())] }]);
        let chat_req = to_chat_request(&req, "gpt-4o-mini").unwrap();
        assert_eq!(chat_req.messages[0].role, "system");
        assert_eq!(chat_req.messages[0].content.as_deref(), Some("be terse"));
        assert_eq!(chat_req.messages[1].role, "user");
        assert_eq!(chat_req.temperature, Some(0.3));
    }

    #[test]
    fn to_chat_message_collapses_a_lone_tool_result_into_a_tool_role_message() {
        let msg = Message {
            role: Role::User,
            content: vec![Input::ToolResult {
                tool_call_id: "call_1".into(),
                content: serde_json::json!("42"),
                is_error: false,
            }],
        };
        let chat_msg = to_chat_message(&msg).unwrap();
        assert_eq!(chat_msg.role, "tool");
        assert_eq!(chat_msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(chat_msg.content.as_deref(), Some("42"));
    }

    #[test]
    fn to_chat_message_rejects_an_inline_image() {
        let msg = Message {
            role: Role::User,
            content: vec![Input::Image { mime: None, source: conduit_core::MediaSource::Binary(vec![1]) }],
        };
        assert!(to_chat_message(&msg).is_err());
    }

    #[test]
    fn from_chat_response_extracts_text_and_tool_calls_and_maps_finish_reason() {
        let response = ChatResponse {
            choices: vec![ChatChoice {
                message: ChatMessage {
                    role: "assistant".into(),
                    content: Some("done".into()),
                    tool_calls: vec![ToolCallDto {
                        id: "call_1".into(),
                        kind: "function".into(),
                        function: FunctionCallDto { name: "search".into(), arguments: "{\"q\":\"rust\"}".into() },
                    }],
                    tool_call_id: None,
                },
                finish_reason: Some("tool_calls".into()),
            }],
            usage: Some(super::super::dto::ChatUsage { prompt_tokens: Some(5), completion_tokens: Some(2), total_tokens: Some(7) }),
        };

        let generated = from_chat_response(response).unwrap();
        assert_eq!(generated.outputs[0], Output::Text("done".into()));
        match &generated.outputs[1] {
            Output::ToolCalls(calls) => {
                assert_eq!(calls[0].name, "search");
                assert_eq!(calls[0].arguments, serde_json::json!({"q": "rust"}));
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
        assert_eq!(generated.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(*generated.usage.unwrap().total_tokens(), 7);
    }

    #[test]
    fn normalize_tool_calls_treats_blank_arguments_as_an_empty_object() {
        let calls = vec![ToolCallDto {
            id: "call_1".into(),
            kind: "function".into(),
            function: FunctionCallDto { name: "noop".into(), arguments: "   ".into() },
        }];
        let normalized = normalize_tool_calls(calls);
        assert_eq!(normalized[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn normalize_tool_calls_reissues_colliding_ids() {
        let calls = vec![
            ToolCallDto { id: "dup".into(), kind: "function".into(), function: FunctionCallDto { name: "a".into(), arguments: "{}".into() } },
            ToolCallDto { id: "dup".into(), kind: "function".into(), function: FunctionCallDto { name: "b".into(), arguments: "{}".into() } },
        ];
        let normalized = normalize_tool_calls(calls);
        assert_eq!(normalized[0].id, "dup");
        assert_eq!(normalized[1].id, "dup-1");
    }

    #[test]
    fn fold_stream_chunk_accumulates_text_across_chunks() {
        let mut response = GenerateResponse { outputs: Vec::new(), stop_reason: None, usage: None };
        fold_stream_chunk(
            &mut response,
            ChatStreamChunk {
                choices: vec![super::super::dto::ChatStreamChoice {
                    delta: super::super::dto::ChatStreamDelta { content: Some("Hel".into()), tool_calls: Vec::new() },
                    finish_reason: None,
                }],
                usage: None,
            },
        );
        fold_stream_chunk(
            &mut response,
            ChatStreamChunk {
                choices: vec![super::super::dto::ChatStreamChoice {
                    delta: super::super::dto::ChatStreamDelta { content: Some("lo".into()), tool_calls: Vec::new() },
                    finish_reason: Some("stop".into()),
                }],
                usage: Some(super::super::dto::ChatUsage { prompt_tokens: Some(1), completion_tokens: Some(1), total_tokens: Some(2) }),
            },
        );

        assert_eq!(response.outputs, vec![Output::Text("Hello".into())]);
        assert_eq!(*response.usage.unwrap().total_tokens(), 2);
    }
}
