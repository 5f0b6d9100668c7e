//! Source adapters for the upstream article index.
//!
//! Each adapter turns a [`PageCursor`] into one [`Page`] of [`RawEntry`]
//! records and says whether more pages exist.
//!
//! | Mode | Module | Addressing | End of listing |
//! |------|--------|------------|----------------|
//! | GraphQL | [`graphql`] | `skip`/`limit` | `hasNextPage == false` or empty batch |
//! | HTML | [`html`] | `?page=N` (1-based) | empty parse result |
//!
//! Entries are normalized before they leave an adapter: titles are trimmed
//! and whitespace-collapsed, links must be absolute http(s) URLs, and
//! anything failing those rules is dropped with a warning.

pub mod graphql;
pub mod html;

use crate::config::SourceConfig;
use crate::error::Result;
use crate::http::FetchAsync;
use crate::models::{Page, PageCursor, RawEntry};
use tracing::warn;
use url::Url;

pub use graphql::GraphqlSource;
pub use html::HtmlSource;

/// One upstream listing, addressed page by page.
pub trait SourceAdapter {
    async fn fetch_page(&self, cursor: PageCursor) -> Result<Page>;
}

/// The adapter selected by configuration.
pub enum Source<'a, F> {
    Graphql(GraphqlSource<'a, F>),
    Html(HtmlSource<'a, F>),
}

impl<'a, F> Source<'a, F>
where
    F: FetchAsync,
{
    pub fn from_config(config: &SourceConfig, fetcher: &'a F) -> Result<Self> {
        match config {
            SourceConfig::Graphql {
                endpoint,
                page_size,
            } => Ok(Source::Graphql(GraphqlSource::new(
                fetcher,
                endpoint.clone(),
                *page_size,
            ))),
            SourceConfig::Html {
                listing_url,
                entry_selector,
                link_selector,
                title_selector,
                thumbnail_selector,
                time_selector,
            } => {
                let selectors = html::ListingSelectors::parse(
                    entry_selector,
                    link_selector,
                    title_selector.as_deref(),
                    thumbnail_selector.as_deref(),
                    time_selector.as_deref(),
                )?;
                Ok(Source::Html(HtmlSource::new(fetcher, listing_url, selectors)?))
            }
        }
    }
}

impl<F> SourceAdapter for Source<'_, F>
where
    F: FetchAsync,
{
    async fn fetch_page(&self, cursor: PageCursor) -> Result<Page> {
        match self {
            Source::Graphql(source) => source.fetch_page(cursor).await,
            Source::Html(source) => source.fetch_page(cursor).await,
        }
    }
}

/// Apply the entry invariants: non-empty title, absolute http(s) link.
///
/// `base` resolves relative links and thumbnails; without it they are rejected.
pub(crate) fn normalize_entry(mut entry: RawEntry, base: Option<&Url>) -> Option<RawEntry> {
    entry.title = entry.title.split_whitespace().collect::<Vec<_>>().join(" ");
    if entry.title.is_empty() {
        warn!(link = %entry.link, "Dropping entry without a title");
        return None;
    }

    let Some(link) = resolve_url(&entry.link, base) else {
        warn!(title = %entry.title, link = %entry.link, "Dropping entry without an absolute link");
        return None;
    };
    entry.link = link;

    entry.thumbnail = entry
        .thumbnail
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .and_then(|t| resolve_url(t, base));

    Some(entry)
}

fn resolve_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}
