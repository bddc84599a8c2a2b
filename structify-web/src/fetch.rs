//! Page acquisition: plain HTTP GET or a rendered browser session.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use structify_common::DEFAULT_USER_AGENT;
use structify_drivers::browser::{BrowserDriver, BrowserOptions, NavigationError};
use structify_http::{HttpClient, HttpError, RequestOpts, StatusCode};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Static,
    Rendered,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Static => f.write_str("static"),
            FetchMode::Rendered => f.write_str("rendered"),
        }
    }
}

/// Markup exactly as one fetch returned it.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source_url: Url,
    pub html: String,
    pub fetched_via: FetchMode,
}

impl RawDocument {
    /// blake3 hex digest of the markup.
    pub fn checksum(&self) -> String {
        blake3::hash(self.html.as_bytes()).to_hex().to_string()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP Error: {status} for url: {url}")]
    HttpStatus { status: StatusCode, url: String },
    #[error("Connection Error: {0}")]
    ConnectionFailure(String),
    #[error("Timeout Error: {0}")]
    Timeout(String),
    #[error("Request Error: {0}")]
    GenericRequest(String),
}

impl FetchError {
    fn from_http(err: HttpError, url: &Url) -> Self {
        match err {
            HttpError::Api { status, .. } => FetchError::HttpStatus {
                status,
                url: url.to_string(),
            },
            HttpError::Connect(msg) => FetchError::ConnectionFailure(msg),
            HttpError::Timeout(msg) => FetchError::Timeout(msg),
            other => FetchError::GenericRequest(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("TimeOut Error: {0}")]
    NavigationTimeout(String),
    #[error("Error: {0}")]
    GenericRenderFailure(String),
}

impl From<NavigationError> for RenderError {
    fn from(err: NavigationError) -> Self {
        match err {
            NavigationError::Timeout { .. } => RenderError::NavigationTimeout(err.to_string()),
            NavigationError::Other(e) => RenderError::GenericRenderFailure(format!("{e:#}")),
        }
    }
}

impl From<anyhow::Error> for RenderError {
    fn from(err: anyhow::Error) -> Self {
        RenderError::GenericRenderFailure(format!("{err:#}"))
    }
}

/// Anything that can turn a URL into markup.
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn fetch(&self, url: &Url) -> Result<RawDocument, Self::Error>;
}

/// Single GET with a browser-like User-Agent. No retries.
#[derive(Clone)]
pub struct StaticFetcher {
    client: HttpClient,
    user_agent: HeaderValue,
}

impl StaticFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = HttpClient::unanchored()
            .map_err(|e| FetchError::GenericRequest(e.to_string()))?
            .with_timeout(timeout);
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| FetchError::GenericRequest(format!("invalid user agent: {e}")))?;
        Ok(Self { client, user_agent })
    }

    /// Default browser User-Agent and a 30 s request timeout.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(DEFAULT_USER_AGENT, Duration::from_secs(30))
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    type Error = FetchError;

    async fn fetch(&self, url: &Url) -> Result<RawDocument, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, self.user_agent.clone());

        let started = Instant::now();
        let html = self
            .client
            .get_text(
                url.as_str(),
                RequestOpts {
                    headers: Some(headers),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                let err = FetchError::from_http(e, url);
                tracing::error!(url = %url, error = %err, "fetch.static.failed");
                err
            })?;

        let doc = RawDocument {
            source_url: url.clone(),
            html,
            fetched_via: FetchMode::Static,
        };
        tracing::info!(
            url = %url,
            bytes = doc.html.len(),
            checksum = %doc.checksum(),
            duration_ms = started.elapsed().as_millis() as u64,
            "fetch.static.done"
        );
        Ok(doc)
    }
}

/// Loads the page in a fresh headless browser session per call.
#[derive(Debug, Clone, Default)]
pub struct RenderedFetcher {
    options: BrowserOptions,
}

impl RenderedFetcher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    async fn render(driver: &BrowserDriver, url: &Url) -> Result<String, RenderError> {
        let page = driver.goto(url.as_str()).await?;
        page.wait_for_dom_settled().await?;
        Ok(page.content().await?)
    }
}

#[async_trait]
impl Fetcher for RenderedFetcher {
    type Error = RenderError;

    async fn fetch(&self, url: &Url) -> Result<RawDocument, RenderError> {
        let started = Instant::now();
        let driver = BrowserDriver::launch(&self.options).await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "fetch.rendered.launch_failed");
            RenderError::from(e)
        })?;

        let result = Self::render(&driver, url).await;
        if let Err(e) = driver.close().await {
            tracing::warn!(url = %url, error = %e, "fetch.rendered.close_failed");
        }

        let html = result.inspect_err(|err| {
            tracing::error!(url = %url, error = %err, "fetch.rendered.failed");
        })?;
        let doc = RawDocument {
            source_url: url.clone(),
            html,
            fetched_via: FetchMode::Rendered,
        };
        tracing::info!(
            url = %url,
            bytes = doc.html.len(),
            checksum = %doc.checksum(),
            duration_ms = started.elapsed().as_millis() as u64,
            "fetch.rendered.done"
        );
        Ok(doc)
    }
}
