//! Paginated HTML listing adapter.
//!
//! Requests `listing_url?page=N` and walks a fixed selector path to find
//! entry blocks. There is no explicit "has more" flag: a page that parses
//! to nothing ends the listing. Markup drift therefore shows up as an early
//! end of collection, never as a failed run.

use super::{SourceAdapter, normalize_entry};
use crate::error::{Error, Result};
use crate::http::FetchAsync;
use crate::models::{Page, PageCursor, RawEntry};
use crate::utils::parse_timestamp;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

/// Compiled selector path for one listing layout.
#[derive(Debug)]
pub struct ListingSelectors {
    entry: Selector,
    link: Selector,
    title: Option<Selector>,
    thumbnail: Option<Selector>,
    time: Option<Selector>,
}

impl ListingSelectors {
    /// Compile the selector path for one listing layout.
    ///
    /// # Arguments
    ///
    /// * `entry` - Matches one block per article on the listing page
    /// * `link` - Inside an entry block, the anchor carrying the permalink
    /// * `title` - Inside an entry block, the title element; `None` uses the link text
    /// * `thumbnail` - Inside an entry block, an `img` with `src` or `data-src`
    /// * `time` - Inside an entry block, an element with a `datetime` attribute
    ///
    /// # Returns
    ///
    /// The compiled selectors, or [`Error::Selector`] naming the first invalid one.
    pub fn parse(
        entry: &str,
        link: &str,
        title: Option<&str>,
        thumbnail: Option<&str>,
        time: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            entry: compile(entry)?,
            link: compile(link)?,
            title: title.map(compile).transpose()?,
            thumbnail: thumbnail.map(compile).transpose()?,
            time: time.map(compile).transpose()?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Adapter for a `?page=N` HTML archive.
pub struct HtmlSource<'a, F> {
    fetcher: &'a F,
    listing_url: Url,
    selectors: ListingSelectors,
}

impl<'a, F> HtmlSource<'a, F>
where
    F: FetchAsync,
{
    pub fn new(fetcher: &'a F, listing_url: &str, selectors: ListingSelectors) -> Result<Self> {
        let listing_url = Url::parse(listing_url)
            .map_err(|e| Error::Config(format!("invalid listing_url `{listing_url}`: {e}")))?;
        Ok(Self {
            fetcher,
            listing_url,
            selectors,
        })
    }

    /// Listing pages are numbered from 1. A `page` pair already present in
    /// `listing_url` is replaced, other query pairs are kept.
    fn page_url(&self, cursor: PageCursor) -> Url {
        let kept: Vec<(String, String)> = self
            .listing_url
            .query_pairs()
            .filter(|(k, _)| *k != "page")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut url = self.listing_url.clone();
        url.set_query(None);
        url.query_pairs_mut()
            .extend_pairs(kept)
            .append_pair("page", &(cursor.index + 1).to_string());
        url
    }
}

impl<F> SourceAdapter for HtmlSource<'_, F>
where
    F: FetchAsync,
{
    #[instrument(level = "info", skip(self))]
    async fn fetch_page(&self, cursor: PageCursor) -> Result<Page> {
        let url = self.page_url(cursor);
        let body = self.fetcher.get_text(url.as_str()).await?;
        let entries = parse_listing(&body, &self.selectors, &url);
        let page = Page::from_parsed(entries);
        info!(
            %url,
            count = page.entries.len(),
            state = ?page.state,
            "Fetched HTML listing page"
        );
        Ok(page)
    }
}

/// Extract entries from one listing document. Relative URLs resolve against `base`.
pub fn parse_listing(body: &str, selectors: &ListingSelectors, base: &Url) -> Vec<RawEntry> {
    let document = Html::parse_document(body);
    let mut entries = Vec::new();

    for block in document.select(&selectors.entry) {
        let Some(anchor) = block.select(&selectors.link).next() else {
            debug!("Entry block without a link");
            continue;
        };
        let link = anchor.value().attr("href").unwrap_or_default().to_string();

        let title = match &selectors.title {
            Some(sel) => block.select(sel).next().map(element_text),
            None => Some(element_text(anchor)),
        }
        .unwrap_or_default();

        let thumbnail = selectors.thumbnail.as_ref().and_then(|sel| {
            block.select(sel).next().and_then(|img| {
                let el = img.value();
                el.attr("src")
                    .or_else(|| el.attr("data-src"))
                    .map(str::to_string)
            })
        });

        let published = selectors.time.as_ref().and_then(|sel| {
            block
                .select(sel)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .and_then(parse_timestamp)
        });

        let raw = RawEntry {
            title,
            link,
            thumbnail,
            published,
        };
        if let Some(entry) = normalize_entry(raw, Some(base)) {
            entries.push(entry);
        }
    }

    debug!(count = entries.len(), "Parsed listing entries");
    entries
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}
