use color_eyre::eyre::{eyre, Result};
use std::sync::Arc;
use std::time::Duration;
use structify_config::StructifyConfig;
use structify_drivers::browser::BrowserOptions;
use structify_llm::schema::{presets, ExtractionSchema, FieldType};
use structify_llm::{build_llm_client, ExtractionSettings, Extractor};
use structify_web::normalize::{DEFAULT_UNWANTED_TAGS, DEFAULT_WANTED_TAGS};
use structify_web::{Pipeline, RenderedFetcher, StaticFetcher, TagPolicy};
use tokio_util::sync::CancellationToken;

/// What the caller asked the run to produce.
#[derive(Debug, Default)]
pub struct RunRequest {
    pub fetch_only: bool,
    pub schema: Option<String>,
    pub fields: Vec<(String, FieldType)>,
    pub query: Option<String>,
    pub links: bool,
}

pub fn tag_policy(cfg: &StructifyConfig, links: bool) -> Result<TagPolicy> {
    let wanted = cfg
        .tags
        .wanted
        .clone()
        .unwrap_or_else(|| DEFAULT_WANTED_TAGS.map(String::from).to_vec());
    let unwanted = cfg
        .tags
        .unwanted
        .clone()
        .unwrap_or_else(|| DEFAULT_UNWANTED_TAGS.map(String::from).to_vec());
    let policy = TagPolicy::new(wanted, unwanted)?;
    Ok(if links || cfg.tags.include_links {
        policy.with_links()
    } else {
        policy
    })
}

pub fn schema_for(req: &RunRequest) -> Result<ExtractionSchema> {
    if !req.fields.is_empty() {
        let name = req.schema.as_deref().unwrap_or("extracted");
        return Ok(ExtractionSchema::from_field_types(name, req.fields.clone())?);
    }
    let name = req.schema.as_deref().unwrap_or("generic");
    presets::by_name(name).ok_or_else(|| eyre!("unknown schema preset: {name}"))
}

/// Browser launch settings. Navigation and settle budgets stay at their fixed defaults.
pub fn browser_options(cfg: &StructifyConfig) -> BrowserOptions {
    BrowserOptions {
        webdriver_url: cfg.fetch.webdriver_url.clone(),
        headless: cfg.fetch.headless,
        user_agent: cfg.fetch.user_agent.clone(),
        ..BrowserOptions::default()
    }
}

pub fn build_pipeline(
    cfg: &StructifyConfig,
    req: &RunRequest,
    cancel: CancellationToken,
) -> Result<Pipeline> {
    let static_fetcher = StaticFetcher::new(
        &cfg.fetch.user_agent,
        Duration::from_secs(cfg.fetch.timeout_secs),
    )?;
    let rendered_fetcher = RenderedFetcher::new(browser_options(cfg));

    let pipeline = Pipeline::new(Arc::new(static_fetcher), Arc::new(rendered_fetcher))
        .with_policy(tag_policy(cfg, req.links)?)
        .with_max_input_chars(cfg.extraction.max_input_chars);

    if req.fetch_only {
        return Ok(pipeline);
    }

    let schema = schema_for(req)?;
    let client = build_llm_client(&cfg.llm)?;
    let mut extractor = Extractor::new(
        client,
        ExtractionSettings {
            max_attempts: cfg.extraction.max_attempts,
            temperature: cfg.extraction.temperature,
        },
    )
    .with_cancellation(cancel);
    if let Some(query) = &req.query {
        extractor = extractor.with_query(query.clone());
    }
    tracing::info!(schema = %schema.name, model = %cfg.llm.model, "app.pipeline.extract_mode");
    Ok(pipeline.with_extractor(extractor, schema))
}
