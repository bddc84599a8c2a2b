use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use structify_http::HttpError;

/// Fixed pause applied after a rate-limit response.
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// One chat-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    /// Ask the provider to constrain output to a single JSON object.
    pub json_object: bool,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `2^attempt` seconds.
    Exponential,
    Fixed(Duration),
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Exponential => Duration::from_secs(2u64.saturating_pow(attempt)),
            Backoff::Fixed(d) => *d,
        }
    }
}

/// Failure classes of the completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// No response was obtained (connect failure, timeout, dropped stream).
    TransientConnectivity,
    /// The provider answered 429.
    RateLimited,
    /// Any other API-level failure; never retried.
    FatalApi,
}

impl CompletionErrorKind {
    pub fn retryable(self) -> bool {
        self.backoff().is_some()
    }

    /// Backoff policy for a retryable kind, `None` for fatal ones.
    pub fn backoff(self) -> Option<Backoff> {
        match self {
            CompletionErrorKind::TransientConnectivity => Some(Backoff::Exponential),
            CompletionErrorKind::RateLimited => Some(Backoff::Fixed(RATE_LIMIT_BACKOFF)),
            CompletionErrorKind::FatalApi => None,
        }
    }
}

impl fmt::Display for CompletionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CompletionErrorKind::TransientConnectivity => "connection error",
            CompletionErrorKind::RateLimited => "rate limit exceeded",
            CompletionErrorKind::FatalApi => "API error",
        };
        f.write_str(label)
    }
}

#[derive(thiserror::Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
}

impl CompletionError {
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::FatalApi, message)
    }
}

impl From<HttpError> for CompletionError {
    fn from(err: HttpError) -> Self {
        let kind = if err.is_transport() {
            CompletionErrorKind::TransientConnectivity
        } else if err.is_rate_limited() {
            CompletionErrorKind::RateLimited
        } else {
            CompletionErrorKind::FatalApi
        };
        Self::new(kind, err.to_string())
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one chat completion. Implementations must not retry internally.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError>;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles() {
        let delays: Vec<u64> = (1..=4)
            .map(|a| Backoff::Exponential.delay(a).as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8, 16]);
    }

    #[test]
    fn exponential_backoff_saturates() {
        assert_eq!(Backoff::Exponential.delay(200).as_secs(), u64::MAX);
    }

    #[test]
    fn only_fatal_is_not_retryable() {
        assert!(CompletionErrorKind::TransientConnectivity.retryable());
        assert!(CompletionErrorKind::RateLimited.retryable());
        assert!(!CompletionErrorKind::FatalApi.retryable());
        assert_eq!(
            CompletionErrorKind::RateLimited.backoff(),
            Some(Backoff::Fixed(Duration::from_secs(60)))
        );
    }

    #[test]
    fn http_errors_map_to_kinds() {
        let timeout: CompletionError = HttpError::Timeout("slow".into()).into();
        assert_eq!(timeout.kind, CompletionErrorKind::TransientConnectivity);

        let limited: CompletionError = HttpError::Api {
            status: reqwest_status(429),
            message: "slow down".into(),
            request_id: "-".into(),
        }
        .into();
        assert_eq!(limited.kind, CompletionErrorKind::RateLimited);

        let bad: CompletionError = HttpError::Api {
            status: reqwest_status(400),
            message: "bad request".into(),
            request_id: "-".into(),
        }
        .into();
        assert_eq!(bad.kind, CompletionErrorKind::FatalApi);
    }

    fn reqwest_status(code: u16) -> structify_http::StatusCode {
        structify_http::StatusCode::from_u16(code).unwrap()
    }
}
