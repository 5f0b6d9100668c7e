//! One complete run: collect, then emit.
//!
//! The feed file is touched only after collection has fully succeeded, so
//! any failure leaves the previous feed in place.

use crate::aggregate::{self, Limits};
use crate::config::FeedConfig;
use crate::enrich::Enricher;
use crate::error::Result;
use crate::http::{FetchAsync, build_fetcher};
use crate::outputs::rss;
use crate::scrapers::Source;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{info, instrument};

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub items: usize,
    /// Items whose date is the run's fallback "now".
    pub inferred: usize,
    pub output: PathBuf,
}

/// Run the pipeline against the real network.
pub async fn run(config: &FeedConfig) -> Result<RunSummary> {
    config.validate()?;
    let fetcher = build_fetcher(config)?;
    run_with(config, &fetcher, Utc::now()).await
}

/// Run the pipeline over any transport. `now` is both the fallback publish
/// instant and the feed's build date.
#[instrument(level = "info", skip_all, fields(output = %config.output_path.display()))]
pub async fn run_with<F>(config: &FeedConfig, fetcher: &F, now: DateTime<Utc>) -> Result<RunSummary>
where
    F: FetchAsync,
{
    let source = Source::from_config(&config.source, fetcher)?;
    let enricher = Enricher::new(fetcher, config.enrich, config.enrich_concurrency, now);
    let limits = Limits {
        max_items: config.max_items,
        max_pages: config.max_pages,
    };

    let articles = aggregate::collect(&source, &enricher, limits).await?;
    let inferred = articles.iter().filter(|a| a.published_inferred).count();
    info!(count = articles.len(), inferred, "Keeping newest articles for the feed");

    rss::emit(&config.output_path, &config.feed, &articles, now).await?;

    Ok(RunSummary {
        items: articles.len(),
        inferred,
        output: config.output_path.clone(),
    })
}
