//! Web acquisition and the scrape pipeline.
//!
//! - Static and rendered page fetchers behind one [`fetch::Fetcher`] trait
//! - Tag-whitelist text normalization on top of `scraper` (`normalize`)
//! - The fetch → normalize → extract orchestrator (`pipeline`)

pub mod fetch;
pub mod normalize;
pub mod pipeline;

pub use fetch::{FetchError, FetchMode, Fetcher, RawDocument, RenderError, RenderedFetcher, StaticFetcher};
pub use normalize::{NormalizeError, NormalizedContent, TagPolicy};
pub use pipeline::{Pipeline, PipelineError, PipelineMode, ScrapeOutcome, ScrapeReport};
