//! Translation between `conduit_core`'s normalized shapes and Gemini's
//! `generateContent` wire format. This module is the only place Gemini's
//! field names appear.

use std::collections::HashSet;

use conduit_core::{
    GenerateRequest, GenerateResponse, Input, Message, Output, Role, StopReason, ToolCall,
    TokenUsageData,
};
use conduit_error::{ProviderError, ProviderErrorKind};

use super::types::{
    GenerateContentRequest, GenerateContentResponse, GenerationConfig, GeminiContent,
    GeminiFunctionCall, GeminiFunctionDeclaration, GeminiFunctionResponse, GeminiPart,
    GeminiToolGroup,
};

pub fn to_request(req: &GenerateRequest) -> Result<GenerateContentRequest, ProviderError> {
    let contents = req
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(to_content)
        .collect::<Result<Vec<_>, _>>()?;

    let system_instruction = req.system.as_ref().map(|text| GeminiContent {
        role: "user".to_string(),
        parts: vec![GeminiPart::Text { text: text.clone() }],
    });

    let generation_config = if req.temperature.is_some() || req.max_tokens.is_some() {
        Some(GenerationConfig {
            temperature: req.temperature,
            max_output_tokens: req.max_tokens,
        })
    } else {
        None
    };

    let tools = if req.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiToolGroup {
            function_declarations: req
                .tools
                .iter()
                .map(|t| GeminiFunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                })
                .collect(),
        }]
    };

    Ok(GenerateContentRequest {
        contents,
        system_instruction,
        generation_config,
        tools,
    })
}

fn to_content(message: &Message) -> Result<GeminiContent, ProviderError> {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "model",
        Role::System => unreachable!("system messages filtered out before this point"),
    };
    let parts = message
        .content
        .iter()
        .map(to_part)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(GeminiContent {
        role: role.to_string(),
        parts,
    })
}

fn to_part(input: &Input) -> Result<GeminiPart, ProviderError> {
    Ok(match input {
        Input::Text(text) => GeminiPart::Text { text: text.clone() },
        Input::ToolUse { name, arguments, .. } => GeminiPart::FunctionCall {
            function_call: GeminiFunctionCall {
                name: name.clone(),
                args: arguments.clone(),
            },
        },
        Input::ToolResult {
            tool_call_id,
            content,
            is_error,
        } => {
            let response = if *is_error {
                serde_json::json!({ "error": content })
            } else {
                content.clone()
            };
            GeminiPart::FunctionResponse {
                function_response: GeminiFunctionResponse {
                    name: tool_call_id.clone(),
                    response,
                },
            }
        }
        Input::Image { .. } => {
            return Err(ProviderError::new(ProviderErrorKind::Permanent(
                "gemini adapter does not yet support inline image parts".into(),
            )))
        }
        other => {
            return Err(ProviderError::new(ProviderErrorKind::Permanent(format!(
                "gemini adapter does not support input variant {other:?}"
            ))))
        }
    })
}

pub fn from_response(resp: GenerateContentResponse) -> Result<GenerateResponse, ProviderError> {
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::new(ProviderErrorKind::InvalidResponse("no candidates in response".into())))?;

    let mut outputs = Vec::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.parts {
        match part {
            GeminiPart::Text { text } => outputs.push(Output::Text(text)),
            GeminiPart::FunctionCall { function_call } => {
                let arguments = if function_call.args.is_null() {
                    serde_json::json!({})
                } else {
                    function_call.args
                };
                tool_calls.push(ToolCall {
                    id: format!("call_{}", tool_calls.len()),
                    name: function_call.name,
                    arguments,
                });
            }
            GeminiPart::FunctionResponse { .. } => {}
        }
    }
    if !tool_calls.is_empty() {
        outputs.push(Output::ToolCalls(dedup_tool_call_ids(tool_calls)));
    }

    let stop_reason = candidate.finish_reason.as_deref().map(|reason| match reason {
        "MAX_TOKENS" => StopReason::MaxTokens,
        "STOP" if outputs.iter().any(|o| matches!(o, Output::ToolCalls(_))) => StopReason::ToolUse,
        _ => StopReason::EndTurn,
    });

    let usage = resp.usage_metadata.map(|u| {
        TokenUsageData::new(
            u.prompt_token_count.unwrap_or(0),
            u.candidates_token_count.unwrap_or(0),
            u.total_token_count
                .unwrap_or_else(|| u.prompt_token_count.unwrap_or(0) + u.candidates_token_count.unwrap_or(0)),
        )
    });

    Ok(GenerateResponse {
        outputs,
        stop_reason,
        usage,
    })
}

/// Gemini assigns no id to function calls; synthesized ids are positional
/// and must still be de-duplicated if a provider chain reorders a turn.
fn dedup_tool_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
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

    fn request_with(content: Vec<Input>) -> GenerateRequest {
        GenerateRequest {
            messages: vec![Message { role: Role::User, content }],
            system: Some("be terse".into()),
            temperature: Some(0.4),
            ..Default::default()
        }
    }

    #[test]
    fn to_request_moves_the_system_prompt_out_of_contents_and_into_system_instruction() {
        let req = request_with(vec![Input::Text("hi".into())]);
        let gemini_req = to_request(&req).unwrap();
        assert_eq!(gemini_req.contents.len(), 1);
        let system = gemini_req.system_instruction.unwrap();
        assert_eq!(system.parts.len(), 1);
        assert!(matches!(&system.parts[0], GeminiPart::Text { text } if text == "be terse"));
        assert_eq!(gemini_req.generation_config.unwrap().temperature, Some(0.4));
    }

    #[test]
    fn to_request_maps_assistant_role_to_model() {
        let req = GenerateRequest {
            messages: vec![Message { role: Role::Assistant, content: vec![Input::Text("ok".into())] }],
            ..Default::default()
        };
        let gemini_req = to_request(&req).unwrap();
        assert_eq!(gemini_req.contents[0].role, "model");
    }

    #[test]
    fn to_request_rejects_an_unsupported_input_variant() {
        let req = request_with(vec![Input::Image { mime: None, source: conduit_core::MediaSource::Binary(vec![1]) }]);
        assert!(to_request(&req).is_err());
    }

    #[test]
    fn from_response_collects_text_and_function_call_parts() {
        let response = GenerateContentResponse {
            candidates: vec![super::super::types::GeminiCandidate {
                content: GeminiContent {
                    role: "model".into(),
                    parts: vec![
                        GeminiPart::Text { text: "let me check".into() },
                        GeminiPart::FunctionCall {
                            function_call: GeminiFunctionCall { name: "search".into(), args: serde_json::json!({"q": "rust"}) },
                        },
                    ],
                },
                finish_reason: Some("STOP".into()),
            }],
            usage_metadata: Some(super::super::types::GeminiUsage {
                prompt_token_count: Some(7),
                candidates_token_count: Some(3),
                total_token_count: Some(10),
            }),
        };

        let generated = from_response(response).unwrap();
        assert_eq!(generated.outputs[0], Output::Text("let me check".into()));
        match &generated.outputs[1] {
            Output::ToolCalls(calls) => assert_eq!(calls[0].name, "search"),
            other => panic!("expected tool calls, got {other:?}"),
        }
        assert_eq!(generated.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(*generated.usage.unwrap().total_tokens(), 10);
    }

    #[test]
    fn from_response_fails_when_there_are_no_candidates() {
        let response = GenerateContentResponse { candidates: vec![], usage_metadata: None };
        assert!(from_response(response).is_err());
    }

    #[test]
    fn dedup_tool_call_ids_reissues_colliding_ids() {
        let calls = vec![
            ToolCall { id: "dup".into(), name: "a".into(), arguments: serde_json::Value::Null },
            ToolCall { id: "dup".into(), name: "b".into(), arguments: serde_json::Value::Null },
        ];
        let deduped = dedup_tool_call_ids(calls);
        assert_ne!(deduped[0].id, deduped[1].id);
    }
}
