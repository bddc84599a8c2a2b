//! LLM-backed structured extraction for structify.
//!
//! This crate exposes a provider-neutral [`traits::LlmClient`] seam, an
//! OpenAI chat-completions implementation, declarative
//! [`schema::ExtractionSchema`] contracts and the retrying
//! [`extract::Extractor`] that ties them together.
//!
//! # Examples
//! ```no_run
//! use structify_common::{LlmConfig, Result};
//! use structify_llm::build_llm_client;
//!
//! # fn main() -> Result<()> {
//! let cfg = LlmConfig {
//!     api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
//!     ..LlmConfig::default()
//! };
//! let client = build_llm_client(&cfg)?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
pub mod extract;
pub mod openai;
pub mod schema;
pub mod traits;

use openai::OpenAiClient;
use std::sync::Arc;
use structify_common::{LlmConfig, StructifyError};
use traits::LlmClient;

pub use extract::{ExtractError, Extraction, ExtractionSettings, Extractor};
pub use schema::{ExtractionSchema, FieldSpec, FieldType, SchemaValidationError};

/// Build the completion client described by `config`.
pub fn build_llm_client(
    config: &LlmConfig,
) -> structify_common::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    if config.api_key.trim().is_empty() {
        return Err(StructifyError::Config(
            "No API key configured (set llm.api_key or STRUCTIFY__LLM__API_KEY)".to_string(),
        ));
    }
    if config.model.trim().is_empty() {
        return Err(StructifyError::Config("llm.model must not be empty".to_string()));
    }
    let client = OpenAiClient::new(
        config.api_key.clone(),
        config.model.clone(),
        &config.base_url,
    )?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_a_config_error() {
        let err = build_llm_client(&LlmConfig::default())
            .err()
            .expect("empty key must be rejected");
        assert!(matches!(err, StructifyError::Config(_)));
    }

    #[test]
    fn builds_client_with_configured_model() {
        let cfg = LlmConfig {
            api_key: "sk-test".into(),
            model: "gpt-4o-mini".into(),
            base_url: "http://localhost:1234/v1".into(),
        };
        let client = build_llm_client(&cfg).unwrap();
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }
}
