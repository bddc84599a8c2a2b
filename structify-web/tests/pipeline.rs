use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use structify_llm::extract::{ExtractionSettings, Extractor};
use structify_llm::schema::presets;
use structify_llm::traits::{
    CompletionError, CompletionErrorKind, CompletionRequest, CompletionResponse, LlmClient,
};
use structify_web::fetch::{FetchError, FetchMode, Fetcher, RawDocument, RenderError};
use structify_web::normalize::TagPolicy;
use structify_web::pipeline::{Pipeline, ReportStatus, ScrapeOutcome, ScrapeReport};
use url::Url;

const PAGE: &str = r#"<html><head><style>h1 { color: red }</style></head><body>
<h1>Quotes</h1>
<span class="text">"Be yourself."</span>
<span class="author">Oscar Wilde</span>
<a href="/author/oscar">about</a>
<script>track()</script>
</body></html>"#;

struct FixedPage(&'static str);

#[async_trait]
impl Fetcher for FixedPage {
    type Error = FetchError;

    async fn fetch(&self, url: &Url) -> Result<RawDocument, FetchError> {
        Ok(RawDocument {
            source_url: url.clone(),
            html: self.0.to_string(),
            fetched_via: FetchMode::Static,
        })
    }
}

struct FailingRender;

#[async_trait]
impl Fetcher for FailingRender {
    type Error = RenderError;

    async fn fetch(&self, _url: &Url) -> Result<RawDocument, RenderError> {
        Err(RenderError::NavigationTimeout(
            "navigation timed out after 60000ms".into(),
        ))
    }
}

/// Records the prompt it was given and answers with a canned result.
struct RecordingClient {
    answer: Result<&'static str, CompletionErrorKind>,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmClient for RecordingClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        self.seen
            .lock()
            .unwrap()
            .push(request.messages[1].content.clone());
        match self.answer {
            Ok(text) => Ok(CompletionResponse {
                text: text.into(),
                model: None,
                tokens_used: None,
            }),
            Err(kind) => Err(CompletionError::new(kind, "canned")),
        }
    }

    fn model_name(&self) -> &str {
        "recording"
    }
}

fn pipeline() -> Pipeline {
    Pipeline::new(Arc::new(FixedPage(PAGE)), Arc::new(FailingRender))
}

#[tokio::test]
async fn fetch_only_returns_normalized_text() {
    let out = pipeline().run_static("https://quotes.example/").await.unwrap();
    assert_eq!(
        out,
        ScrapeOutcome::Text("Quotes \"Be yourself.\" Oscar Wilde".into())
    );
}

#[tokio::test]
async fn caller_policy_and_links_are_honoured() {
    let policy = TagPolicy::new(["h1"], ["script", "style"]).unwrap().with_links();
    let out = pipeline()
        .with_policy(policy)
        .run_static("https://quotes.example/")
        .await
        .unwrap();
    assert_eq!(
        out,
        ScrapeOutcome::Text("Quotes about (/author/oscar)".into())
    );
}

#[tokio::test]
async fn truncation_applies_after_normalization() {
    let out = pipeline()
        .with_max_input_chars(6)
        .run_static("https://quotes.example/")
        .await
        .unwrap();
    assert_eq!(out, ScrapeOutcome::Text("Quotes".into()));
}

#[tokio::test]
async fn extraction_receives_delimited_content() {
    let client = Arc::new(RecordingClient {
        answer: Ok(r#"{"quotes": [{"text": "Be yourself.", "author": "Oscar Wilde", "tags": []}]}"#),
        seen: Mutex::new(Vec::new()),
    });
    let extractor = Extractor::new(client.clone(), ExtractionSettings::default());

    let out = pipeline()
        .with_extractor(extractor, presets::quotes())
        .run_static("https://quotes.example/")
        .await
        .unwrap();

    assert_eq!(
        out,
        ScrapeOutcome::Extracted(json!({
            "quotes": [{"text": "Be yourself.", "author": "Oscar Wilde", "tags": []}]
        }))
    );
    let seen = client.seen.lock().unwrap();
    assert_eq!(
        seen.as_slice(),
        ["This is the website content ####Quotes \"Be yourself.\" Oscar Wilde####"]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_as_no_result() {
    let client = Arc::new(RecordingClient {
        answer: Err(CompletionErrorKind::RateLimited),
        seen: Mutex::new(Vec::new()),
    });
    let extractor = Extractor::new(client.clone(), ExtractionSettings::default());

    let result = pipeline()
        .with_extractor(extractor, presets::generic())
        .run_static("https://quotes.example/")
        .await;
    assert_eq!(client.seen.lock().unwrap().len(), 3);

    let report = ScrapeReport::from(result);
    assert_eq!(report.status, ReportStatus::NoResult);
    assert!(report.error.is_none());
}

#[tokio::test]
async fn render_failures_become_error_reports() {
    let report = ScrapeReport::from(pipeline().run_rendered("https://quotes.example/").await);
    assert!(report.is_error());
    assert_eq!(
        report.error.as_deref(),
        Some("TimeOut Error: navigation timed out after 60000ms")
    );
}

#[tokio::test]
async fn fatal_extraction_errors_propagate() {
    let client = Arc::new(RecordingClient {
        answer: Err(CompletionErrorKind::FatalApi),
        seen: Mutex::new(Vec::new()),
    });
    let extractor = Extractor::new(client, ExtractionSettings::default());
    let report = ScrapeReport::from(
        pipeline()
            .with_extractor(extractor, presets::generic())
            .run_static("https://quotes.example/")
            .await,
    );
    assert!(report.is_error());
    assert!(report.error.unwrap().starts_with("Extraction Error: API error"));
}
