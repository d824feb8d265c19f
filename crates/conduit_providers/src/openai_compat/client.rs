//! Generic client for any OpenAI-compatible chat completions API. Shared
//! by the OpenAI, Groq, HuggingFace router, and local Ollama `/v1`
//! adapters — the only differences between them are base URL, auth
//! header, and model name.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tracing::{debug, instrument, warn};

use conduit_core::{GenerateRequest, GenerateResponse, StopReason, StreamEvent};
use conduit_error::{ProviderError, ProviderErrorKind};
use conduit_interface::{Provider, ProviderResult};
use conduit_rate_limit::HttpClientPool;

use super::conversions;
use super::dto::{ChatResponse, ChatStreamChunk};

/// A client for an OpenAI-compatible API endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    id: String,
    model: String,
    api_key: Option<String>,
    base_url: String,
    pool: HttpClientPool,
}

impl OpenAiCompatibleClient {
    /// Builds a client targeting `base_url` (the full `.../chat/completions`
    /// endpoint) with an optional bearer token.
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            api_key,
            base_url: base_url.into(),
            pool: HttpClientPool::default(),
        }
    }

    async fn http_client(&self) -> Result<reqwest::Client, ProviderError> {
        self.pool.client_for(&self.base_url).await
    }

    fn classify(status: reqwest::StatusCode, body: String) -> ProviderErrorKind {
        match status.as_u16() {
            429 => ProviderErrorKind::RateLimited {
                retry_after_secs: None,
            },
            408 => ProviderErrorKind::Timeout,
            s if s >= 500 => ProviderErrorKind::Api { status: s, message: body },
            _ => ProviderErrorKind::Permanent(format!("{status}: {body}")),
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(provider = %self.id, model = %self.model))]
    async fn generate(&self, request: &GenerateRequest) -> ProviderResult<GenerateResponse> {
        let mut body = conversions::to_chat_request(request, &self.model)?;
        body.stream = None;

        let client = self.http_client().await?;
        debug!(message_count = body.messages.len(), "sending chat completion request");

        let mut builder = client.post(&self.base_url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::new(ProviderErrorKind::Timeout)
            } else {
                ProviderError::new(ProviderErrorKind::Api { status: 0, message: e.to_string() })
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(Self::classify(status, text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorKind::InvalidResponse(e.to_string())))?;

        conversions::from_chat_response(parsed)
    }

    #[instrument(skip(self, request), fields(provider = %self.id, model = %self.model))]
    async fn stream(
        &self,
        request: GenerateRequest,
    ) -> ProviderResult<BoxStream<'static, ProviderResult<StreamEvent>>> {
        let mut body = conversions::to_chat_request(&request, &self.model)?;
        body.stream = Some(true);

        let client = self.http_client().await?;
        let mut builder = client.post(&self.base_url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorKind::Api { status: 0, message: e.to_string() }))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(Self::classify(status, text)));
        }

        let mut byte_stream = response.bytes_stream();

        let events = async_stream::stream! {
            let mut buf = String::new();
            // index -> (call id, function name so far, accumulated json args)
            let mut open_tool_calls: std::collections::BTreeMap<usize, (Option<String>, String, String)> =
                std::collections::BTreeMap::new();
            'outer: while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(ProviderError::new(ProviderErrorKind::Api { status: 0, message: e.to_string() }));
                        break;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(idx) = buf.find('\n') {
                    let line = buf[..idx].trim_end_matches('\r').to_string();
                    buf.drain(..=idx);

                    let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        for (_, (id, name, _args)) in std::mem::take(&mut open_tool_calls) {
                            yield Ok(StreamEvent::ToolUseEnd { id: id.unwrap_or(name) });
                        }
                        yield Ok(StreamEvent::MessageEnd { stop_reason: None, usage: None });
                        break 'outer;
                    }

                    let chunk: ChatStreamChunk = match serde_json::from_str(data) {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(error = %e, "skipping malformed stream chunk");
                            continue;
                        }
                    };

                    for choice in &chunk.choices {
                        if let Some(text) = &choice.delta.content {
                            if !text.is_empty() {
                                yield Ok(StreamEvent::DeltaText(text.clone()));
                            }
                        }
                        for delta in &choice.delta.tool_calls {
                            let entry = open_tool_calls
                                .entry(delta.index)
                                .or_insert_with(|| (None, String::new(), String::new()));
                            if let Some(id) = &delta.id {
                                entry.0 = Some(id.clone());
                            }
                            if let Some(function) = &delta.function {
                                if let Some(name) = &function.name {
                                    if entry.1.is_empty() {
                                        entry.1 = name.clone();
                                        yield Ok(StreamEvent::ToolUseBegin {
                                            id: entry.0.clone().unwrap_or_else(|| format!("call_{}", delta.index)),
                                            name: name.clone(),
                                        });
                                    }
                                }
                                if let Some(args) = &function.arguments {
                                    entry.2.push_str(args);
                                    yield Ok(StreamEvent::ToolUseArgsDelta {
                                        id: entry.0.clone().unwrap_or_else(|| format!("call_{}", delta.index)),
                                        partial_json: args.clone(),
                                    });
                                }
                            }
                        }
                        if let Some(reason) = &choice.finish_reason {
                            let stop_reason = match reason.as_str() {
                                "length" => Some(StopReason::MaxTokens),
                                "tool_calls" => Some(StopReason::ToolUse),
                                _ => Some(StopReason::EndTurn),
                            };
                            yield Ok(StreamEvent::MessageEnd { stop_reason, usage: None });
                        }
                    }
                }
            }
        };

        Ok(events.boxed())
    }
}
