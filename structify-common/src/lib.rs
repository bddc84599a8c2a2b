//! Common types and utilities shared across Structify crates.
//!
//! This crate defines the provider configuration, observability helpers, and
//! shared error types used throughout the Structify workspace. It is
//! intentionally lightweight so that every crate can depend on it without
//! introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`LlmConfig`]: provider configuration for the completion endpoint
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`StructifyError`] and [`Result`]: shared error handling
//! - [`DEFAULT_USER_AGENT`]: the browser identity presented by both fetchers
//!
//! # Examples
//!
//! ```rust
//! use structify_common::LlmConfig;
//!
//! let cfg = LlmConfig::default();
//! assert_eq!(cfg.model, "gpt-3.5-turbo-1106");
//! assert!(cfg.api_key.is_empty());
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Browser-identifying header sent by the static fetcher and passed to the
/// rendered browser session.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo-1106";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";

/// Configuration for the chat-completion provider.
///
/// The base URL may point at any OpenAI-compatible gateway.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

// Never print the key, even in debug output.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Error types used across the Structify system.
#[derive(thiserror::Error, Debug)]
pub enum StructifyError {
    /// A client or driver could not be constructed.
    #[error("Initialisation error: {0}")]
    Init(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient alias for results that use [`StructifyError`].
pub type Result<T> = std::result::Result<T, StructifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_api_key() {
        let cfg = LlmConfig {
            api_key: "sk-very-secret".into(),
            ..LlmConfig::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let cfg: LlmConfig = serde_json::from_str(r#"{"api_key":"k"}"#).unwrap();
        assert_eq!(cfg.api_key, "k");
        assert_eq!(cfg.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(cfg.base_url, DEFAULT_OPENAI_BASE_URL);
    }
}
