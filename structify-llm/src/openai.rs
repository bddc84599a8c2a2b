use crate::traits::{
    ChatMessage, CompletionError, CompletionRequest, CompletionResponse, LlmClient,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use structify_common::{Result, StructifyError};
use structify_http::{HttpClient, RequestOpts};

// Completions on long pages routinely take well over the HTTP default.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for OpenAI-compatible `chat/completions` endpoints.
pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub total_tokens: u32,
}

impl OpenAiClient {
    /// Create a new client for the given API key, model and endpoint base.
    ///
    /// `base_url` should end with `/` (e.g. `https://api.openai.com/v1/`); a
    /// missing trailing slash is added so relative joins keep the `v1` segment.
    pub fn new(api_key: String, model: String, base_url: &str) -> Result<Self> {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let client = HttpClient::new(&base)
            .map_err(|e| StructifyError::Init(format!("HttpClient init failed: {e}")))?
            .with_timeout(COMPLETION_TIMEOUT);

        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            response_format: request.json_object.then_some(ResponseFormat {
                kind: "json_object",
            }),
            max_tokens: request.max_tokens,
        };

        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            temperature = request.temperature,
            json_object = request.json_object,
            "openai.chat.request"
        );

        let resp: ChatCompletionResponse = self
            .client
            .post_json_opts(
                "chat/completions",
                &body,
                RequestOpts {
                    bearer: Some(&self.api_key),
                    ..Default::default()
                },
            )
            .await?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::fatal("completion returned no choices"))?;
        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!(id = %resp.id, "openai.chat.truncated_output");
        }
        let text = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CompletionError::fatal("completion returned empty content"))?;

        Ok(CompletionResponse {
            text,
            model: resp.model,
            tokens_used: resp.usage.map(|u| u.total_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
