use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use std::path::PathBuf;
use std::process::ExitCode;
use structify_common::observability::{LogConfig, LogFormat, init_logging};
use structify_config::{StructifyConfig, StructifyConfigLoader};
use structify_llm::schema::FieldType;
use structify_web::{FetchMode, ScrapeReport};
use tokio_util::sync::CancellationToken;
use wiring::{RunRequest, build_pipeline};
mod wiring;

const DEFAULT_CONFIG_FILE: &str = "structify.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Via {
    /// Plain HTTP GET
    Static,
    /// Headless browser through WebDriver
    Rendered,
}

impl From<Via> for FetchMode {
    fn from(via: Via) -> Self {
        match via {
            Via::Static => FetchMode::Static,
            Via::Rendered => FetchMode::Rendered,
        }
    }
}

/// Scrape a page and turn it into structured JSON.
#[derive(Debug, Parser)]
#[command(name = "structify", author, version, about, long_about = None)]
struct Cli {
    /// How to fetch the page
    #[arg(value_enum)]
    via: Via,
    url: String,

    /// Config file (YAML/TOML/JSON); defaults to ./structify.yaml when present
    #[arg(long, env = "STRUCTIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Return normalized page text without calling the model
    #[arg(long)]
    fetch_only: bool,

    /// Predeclared schema: generic or quotes
    #[arg(long)]
    schema: Option<String>,

    /// Ad hoc field as name:type (str, int, float, bool, any, list[T]); repeatable
    #[arg(long = "field", value_parser = parse_field)]
    fields: Vec<(String, FieldType)>,

    /// What to extract, in plain words
    #[arg(long)]
    query: Option<String>,

    /// Include anchor text with its href
    #[arg(long)]
    links: bool,

    /// Write the report here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long)]
    log_format: Option<LogFormat>,
}

fn parse_field(raw: &str) -> std::result::Result<(String, FieldType), String> {
    let (name, ty) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected name:type, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in {raw:?}"));
    }
    let ty = ty.parse::<FieldType>().map_err(|e| e.to_string())?;
    Ok((name.to_string(), ty))
}

fn load_config(cli: &Cli) -> Result<StructifyConfig> {
    let loader = match &cli.config {
        Some(path) => StructifyConfigLoader::new().with_file(path),
        None => StructifyConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    let mut cfg = loader.load().wrap_err("loading configuration")?;
    if let Some(format) = cli.log_format {
        cfg.logging.format = format;
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let cfg = load_config(&cli)?;
    let log_path = init_logging(LogConfig {
        app_name: "structify",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        default_filter: "info",
    })
    .map_err(|e| color_eyre::eyre::eyre!("{e:#}"))?;
    tracing::debug!(log_path = %log_path.display(), "app.logging_ready");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("app.interrupted");
            on_signal.cancel();
        }
    });

    let request = RunRequest {
        fetch_only: cli.fetch_only,
        schema: cli.schema.clone(),
        fields: cli.fields.clone(),
        query: cli.query.clone(),
        links: cli.links,
    };
    let pipeline = build_pipeline(&cfg, &request, cancel)?;

    tracing::info!(url = %cli.url, via = ?cli.via, fetch_only = cli.fetch_only, "app.run.start");
    let report = ScrapeReport::from(pipeline.run(cli.via.into(), &cli.url).await);
    tracing::info!(status = ?report.status, "app.run.done");

    let rendered = serde_json::to_string_pretty(&report)?;
    match &cli.output {
        Some(path) => std::fs::write(path, rendered + "\n")
            .wrap_err_with(|| format!("writing report to {}", path.display()))?,
        None => println!("{rendered}"),
    }

    Ok(if report.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
