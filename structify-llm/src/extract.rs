//! Schema-guided extraction over a chat-completion client.
//!
//! One [`Extractor::extract`] call owns a fresh [`RetryState`]. Connectivity
//! failures back off exponentially, rate limits wait a fixed minute, any other
//! API failure aborts. Running out of attempts is not an error: the call
//! resolves to [`Extraction::SoftFailure`].

use crate::schema::{ExtractionSchema, SchemaValidationError};
use crate::traits::{ChatMessage, CompletionError, CompletionRequest, LlmClient};
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TEMPERATURE: f32 = 0.125;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DELIMITER: &str = "####";

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSettings {
    pub max_attempts: u32,
    pub temperature: f32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Attempt counter for a single extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Record a failed attempt; returns the new attempt number.
    pub fn record_failure(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Success(Value),
    /// Every attempt failed with a retryable error.
    SoftFailure,
}

impl Extraction {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Extraction::Success(v) => Some(v),
            Extraction::SoftFailure => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Api(#[from] CompletionError),
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
    #[error("extraction cancelled")]
    Cancelled,
}

pub struct Extractor {
    client: Arc<dyn LlmClient>,
    settings: ExtractionSettings,
    query: Option<String>,
    cancel: Option<CancellationToken>,
}

impl Extractor {
    pub fn new(client: Arc<dyn LlmClient>, settings: ExtractionSettings) -> Self {
        Self {
            client,
            settings,
            query: None,
            cancel: None,
        }
    }

    /// Narrow the prompt to what the caller wants pulled out of the page.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.trim().is_empty()).then_some(query);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub async fn extract(
        &self,
        content: &str,
        schema: &ExtractionSchema,
    ) -> Result<Extraction, ExtractError> {
        let request = CompletionRequest {
            messages: self.build_messages(content, schema),
            temperature: self.settings.temperature,
            json_object: true,
            max_tokens: None,
        };
        let mut state = RetryState::new(self.settings.max_attempts);

        tracing::info!(
            model = self.client.model_name(),
            schema = %schema.name,
            content_chars = content.chars().count(),
            max_attempts = state.max_attempts,
            "extract.start"
        );

        while !state.exhausted() {
            if self.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }
            let err = match self.client.complete(&request).await {
                Ok(resp) => {
                    tracing::info!(
                        attempt = state.attempt,
                        tokens = resp.tokens_used,
                        "extract.completed"
                    );
                    let value = parse_answer(&resp.text)?;
                    schema.validate(&value)?;
                    return Ok(Extraction::Success(value));
                }
                Err(err) => err,
            };

            let Some(backoff) = err.kind.backoff() else {
                tracing::error!(attempt = state.attempt, error = %err, "extract.fatal");
                return Err(err.into());
            };
            let attempt = state.record_failure();
            if state.exhausted() {
                tracing::warn!(attempt, error = %err, "extract.exhausted");
                break;
            }
            let delay = backoff.delay(attempt);
            tracing::warn!(
                attempt,
                kind = ?err.kind,
                delay_secs = delay.as_secs(),
                error = %err,
                "extract.retrying"
            );
            self.sleep(delay).await?;
        }

        Ok(Extraction::SoftFailure)
    }

    async fn sleep(&self, delay: Duration) -> Result<(), ExtractError> {
        match &self.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("extract.cancelled");
                    Err(ExtractError::Cancelled)
                }
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    fn build_messages(&self, content: &str, schema: &ExtractionSchema) -> Vec<ChatMessage> {
        let example =
            serde_json::to_string_pretty(&schema.example()).unwrap_or_else(|_| "{}".to_string());
        let mut system = format!(
            "You will be given HTML content of a web page, delimited by four hashtags.\n\
             Please extract the following information according to the specified schema, \
             and format it as a JSON object:\n{example}\n\nFields:\n{}",
            schema.field_summary()
        );
        if let Some(query) = &self.query {
            system.push_str(&format!(
                "\nOnly extract what this query asks for: {DELIMITER}{query}{DELIMITER}"
            ));
        }
        vec![
            ChatMessage::system(system),
            ChatMessage::user(format!(
                "This is the website content {DELIMITER}{content}{DELIMITER}"
            )),
        ]
    }
}

/// Parse the answer as-is first; a fence is only stripped when that fails, so
/// backticks inside JSON string values survive.
fn parse_answer(text: &str) -> Result<Value, SchemaValidationError> {
    let direct = serde_json::from_str(text.trim());
    if direct.is_ok() {
        return direct.map_err(|e| SchemaValidationError::InvalidJson(e.to_string()));
    }
    serde_json::from_str(extract_json_block(text))
        .map_err(|e| SchemaValidationError::InvalidJson(e.to_string()))
}

/// Strip a surrounding ```json fence if the model added one.
pub fn extract_json_block(text: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("fence regex is valid")
    });
    fence
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| text.trim())
}
