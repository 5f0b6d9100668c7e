//! Publish-time enrichment.
//!
//! Listing records rarely carry a trustworthy date, so each entry's own page
//! is fetched and its `<meta property="article:published_time">` marker
//! (Unix epoch seconds) read. When the marker is missing, a date the listing
//! supplied is kept; failing that the run's "now" is used and the article is
//! flagged `published_inferred`. Such dates are for ordering only.
//!
//! Page fetches within one listing batch run concurrently up to the
//! configured limit. Output order always matches input order, and the first
//! failed fetch aborts the batch.

use crate::config::EnrichMode;
use crate::error::Result;
use crate::http::FetchAsync;
use crate::models::{Article, RawEntry};
use crate::utils::parse_timestamp;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

static PUBLISHED_TIME: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="article:published_time"]"#).unwrap()
});

/// Resolves a publish instant for every entry of a batch.
pub struct Enricher<'a, F> {
    fetcher: &'a F,
    mode: EnrichMode,
    concurrency: usize,
    now: DateTime<Utc>,
}

impl<'a, F> Enricher<'a, F>
where
    F: FetchAsync,
{
    /// `now` is the fallback instant shared by every inferred date of the run.
    pub fn new(fetcher: &'a F, mode: EnrichMode, concurrency: usize, now: DateTime<Utc>) -> Self {
        Self {
            fetcher,
            mode,
            concurrency: concurrency.max(1),
            now,
        }
    }

    #[instrument(level = "info", skip_all, fields(count = entries.len(), mode = ?self.mode))]
    pub async fn enrich(&self, entries: Vec<RawEntry>) -> Result<Vec<Article>> {
        stream::iter(entries)
            .map(|entry| self.enrich_one(entry))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn enrich_one(&self, entry: RawEntry) -> Result<Article> {
        match (self.mode, entry.published) {
            (EnrichMode::Missing | EnrichMode::Never, Some(listed)) => {
                Ok(Article::from_entry(entry, listed, false))
            }
            (EnrichMode::Never, None) => Ok(Article::from_entry(entry, self.now, true)),
            _ => {
                let body = self.fetcher.get_text(&entry.link).await?;
                match extract_published_time(&body) {
                    Some(published) => {
                        debug!(link = %entry.link, %published, "Resolved publish time");
                        Ok(Article::from_entry(entry, published, false))
                    }
                    None => match entry.published {
                        Some(listed) => {
                            debug!(link = %entry.link, %listed, "No published_time marker; keeping listing date");
                            Ok(Article::from_entry(entry, listed, false))
                        }
                        None => {
                            warn!(link = %entry.link, "No published_time marker; using current time");
                            Ok(Article::from_entry(entry, self.now, true))
                        }
                    },
                }
            }
        }
    }
}

/// Read the `article:published_time` marker from an article page.
pub fn extract_published_time(body: &str) -> Option<DateTime<Utc>> {
    let document = Html::parse_document(body);
    let content = document
        .select(&PUBLISHED_TIME)
        .find_map(|meta| meta.value().attr("content"))?;
    let parsed = parse_timestamp(content);
    if parsed.is_none() {
        warn!(content, "Unparseable published_time marker");
    }
    parsed
}
