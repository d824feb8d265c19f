//! Anthropic Messages API adapter.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tracing::{debug, instrument};

use conduit_core::{GenerateRequest, GenerateResponse, StreamEvent};
use conduit_error::{ProviderError, ProviderErrorKind};
use conduit_interface::{Provider, ProviderResult};
use conduit_rate_limit::HttpClientPool;

use super::conversions;
use super::types::AnthropicResponse;

const API_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Talks to Anthropic's Messages API.
#[derive(Clone)]
pub struct AnthropicClient {
    id: String,
    model: String,
    api_key: String,
    base_url: String,
    pool: HttpClientPool,
}

impl AnthropicClient {
    /// Builds a client for `model`, authenticating with `api_key`.
    pub fn new(id: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            pool: HttpClientPool::default(),
        }
    }

    /// Overrides the endpoint, e.g. for an Anthropic-compatible proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn http_client(&self) -> Result<reqwest::Client, ProviderError> {
        self.pool.client_for(&self.base_url).await
    }

    fn classify(status: reqwest::StatusCode, body: String) -> ProviderErrorKind {
        if status.as_u16() == 429 {
            ProviderErrorKind::RateLimited {
                retry_after_secs: None,
            }
        } else if status.as_u16() == 408 {
            ProviderErrorKind::Timeout
        } else if status.is_server_error() {
            ProviderErrorKind::Api {
                status: status.as_u16(),
                message: body,
            }
        } else {
            ProviderErrorKind::Permanent(format!("{status}: {body}"))
        }
    }
}

#[async_trait]
impl Provider for AnthropicClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(provider = %self.id, model = %self.model))]
    async fn generate(&self, request: &GenerateRequest) -> ProviderResult<GenerateResponse> {
        let body = conversions::to_request(request, &self.model)?;
        let client = self.http_client().await?;

        debug!(message_count = body.messages().len(), "sending anthropic request");

        let response = client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::new(ProviderErrorKind::Timeout)
                } else {
                    ProviderError::new(ProviderErrorKind::Api {
                        status: 0,
                        message: e.to_string(),
                    })
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(Self::classify(status, text)));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorKind::InvalidResponse(e.to_string())))?;

        Ok(conversions::from_response(parsed))
    }

    #[instrument(skip(self, request), fields(provider = %self.id, model = %self.model))]
    async fn stream(
        &self,
        request: GenerateRequest,
    ) -> ProviderResult<BoxStream<'static, ProviderResult<StreamEvent>>> {
        // Anthropic's SSE stream carries fine-grained `content_block_delta`
        // events; we collapse to one `DeltaText` per text delta and a
        // `MessageEnd` once the call completes, same normalization the
        // OpenAI-compatible adapter applies.
        let response = self.generate(&request).await?;
        let stream = async_stream::stream! {
            for output in response.outputs {
                if let conduit_core::Output::Text(text) = output {
                    yield Ok(StreamEvent::DeltaText(text));
                }
            }
            yield Ok(StreamEvent::MessageEnd {
                stop_reason: response.stop_reason,
                usage: response.usage,
            });
        };
        Ok(stream.boxed())
    }
}
