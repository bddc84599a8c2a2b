//! Fetch → normalize → truncate → extract, for either fetch variant.

use crate::fetch::{FetchError, FetchMode, Fetcher, RawDocument, RenderError};
use crate::normalize::{normalize, truncate_chars, TagPolicy};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use structify_llm::{ExtractError, Extraction, ExtractionSchema, Extractor};
use thiserror::Error;
use url::Url;

pub const DEFAULT_MAX_INPUT_CHARS: usize = 16_000;

pub type StaticSource = Arc<dyn Fetcher<Error = FetchError>>;
pub type RenderedSource = Arc<dyn Fetcher<Error = RenderError>>;

/// What to do with normalized page text.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMode {
    /// Return the normalized text as-is.
    FetchOnly,
    Extract(ExtractionSchema),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    Text(String),
    Extracted(Value),
    /// Extraction gave up after exhausting its retries.
    SoftFailure,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Url(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Extraction Error: {0}")]
    Extract(#[from] ExtractError),
}

pub struct Pipeline {
    static_source: StaticSource,
    rendered_source: RenderedSource,
    policy: TagPolicy,
    max_input_chars: usize,
    mode: PipelineMode,
    extractor: Option<Extractor>,
}

impl Pipeline {
    /// Fetch-only pipeline with the default tag policy.
    pub fn new(static_source: StaticSource, rendered_source: RenderedSource) -> Self {
        Self {
            static_source,
            rendered_source,
            policy: TagPolicy::default(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            mode: PipelineMode::FetchOnly,
            extractor: None,
        }
    }

    pub fn with_policy(mut self, policy: TagPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_input_chars(mut self, max: usize) -> Self {
        self.max_input_chars = max;
        self
    }

    /// Switch to extraction mode against `schema`.
    pub fn with_extractor(mut self, extractor: Extractor, schema: ExtractionSchema) -> Self {
        self.extractor = Some(extractor);
        self.mode = PipelineMode::Extract(schema);
        self
    }

    pub fn mode(&self) -> &PipelineMode {
        &self.mode
    }

    pub async fn run_static(&self, url: &str) -> Result<ScrapeOutcome, PipelineError> {
        let url = parse_url(url)?;
        let doc = self.static_source.fetch(&url).await?;
        self.process(doc).await
    }

    pub async fn run_rendered(&self, url: &str) -> Result<ScrapeOutcome, PipelineError> {
        let url = parse_url(url)?;
        let doc = self.rendered_source.fetch(&url).await?;
        self.process(doc).await
    }

    pub async fn run(&self, via: FetchMode, url: &str) -> Result<ScrapeOutcome, PipelineError> {
        match via {
            FetchMode::Static => self.run_static(url).await,
            FetchMode::Rendered => self.run_rendered(url).await,
        }
    }

    async fn process(&self, doc: RawDocument) -> Result<ScrapeOutcome, PipelineError> {
        let normalized = normalize(&doc.html, &self.policy);
        let content = truncate_chars(&normalized.text, self.max_input_chars);
        tracing::info!(
            url = %doc.source_url,
            via = %doc.fetched_via,
            checksum = %doc.checksum(),
            normalized_chars = normalized.char_len(),
            sent_chars = content.chars().count(),
            "pipeline.normalized"
        );

        let (extractor, schema) = match (&self.mode, &self.extractor) {
            (PipelineMode::Extract(schema), Some(extractor)) => (extractor, schema),
            _ => return Ok(ScrapeOutcome::Text(content.to_string())),
        };
        match extractor.extract(content, schema).await? {
            Extraction::Success(value) => Ok(ScrapeOutcome::Extracted(value)),
            Extraction::SoftFailure => {
                tracing::warn!(url = %doc.source_url, "pipeline.soft_failure");
                Ok(ScrapeOutcome::SoftFailure)
            }
        }
    }
}

fn parse_url(raw: &str) -> Result<Url, PipelineError> {
    Url::parse(raw.trim()).map_err(|e| PipelineError::Url(format!("Request Error: {e}: {raw}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    NoResult,
    Error,
}

/// User-facing rendition of a run: status, payload and error text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeReport {
    pub status: ReportStatus,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ScrapeReport {
    pub fn is_error(&self) -> bool {
        self.status == ReportStatus::Error
    }
}

impl From<Result<ScrapeOutcome, PipelineError>> for ScrapeReport {
    fn from(result: Result<ScrapeOutcome, PipelineError>) -> Self {
        match result {
            Ok(ScrapeOutcome::Text(text)) => Self {
                status: ReportStatus::Ok,
                data: Some(Value::String(text)),
                error: None,
            },
            Ok(ScrapeOutcome::Extracted(value)) => Self {
                status: ReportStatus::Ok,
                data: Some(value),
                error: None,
            },
            Ok(ScrapeOutcome::SoftFailure) => Self {
                status: ReportStatus::NoResult,
                data: None,
                error: None,
            },
            Err(err) => Self {
                status: ReportStatus::Error,
                data: None,
                error: Some(err.to_string()),
            },
        }
    }
}
