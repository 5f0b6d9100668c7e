//! Data models for the collection pipeline.
//!
//! - [`RawEntry`]: one listing record as a source adapter yields it
//! - [`Article`]: a normalized entry with a resolved publish instant
//! - [`Page`], [`PageCursor`], [`Pagination`]: the pagination state machine

use chrono::{DateTime, Utc};

/// A listing record before enrichment.
///
/// `published` is whatever the listing itself claimed, if anything.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub thumbnail: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// A normalized blog post ready for sorting and emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    /// Absolute permalink; also the article's identity.
    pub link: String,
    /// Used for ordering. Formatted only when the feed is serialized.
    pub published: DateTime<Utc>,
    /// `true` when `published` is the run's fallback "now" rather than a real date.
    pub published_inferred: bool,
    pub thumbnail: Option<Thumbnail>,
}

impl Article {
    /// Build an article from a listing entry and its resolved publish instant.
    pub fn from_entry(entry: RawEntry, published: DateTime<Utc>, inferred: bool) -> Self {
        Self {
            title: entry.title,
            link: entry.link,
            published,
            published_inferred: inferred,
            thumbnail: entry.thumbnail.map(Thumbnail::new),
        }
    }

    /// The feed item's GUID, always the permalink.
    pub fn guid(&self) -> &str {
        &self.link
    }
}

/// Image attached to an article, emitted as an enclosure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: String,
}

impl Thumbnail {
    /// Wrap an absolute image URL; the MIME type is derived on demand.
    pub fn new(url: String) -> Self {
        Self { url }
    }

    /// `image/png` for `.png` URLs, `image/jpeg` for anything else.
    pub fn mime_type(&self) -> &'static str {
        if self.url.ends_with(".png") {
            "image/png"
        } else {
            "image/jpeg"
        }
    }
}

/// Position in the upstream listing. Page indices are zero-based; each
/// adapter maps them onto its own addressing (offset/limit or `?page=N`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub index: u32,
}

impl PageCursor {
    /// The first page of the listing.
    pub fn first() -> Self {
        Self::default()
    }

    /// The page after this one.
    pub fn next(self) -> Self {
        Self {
            index: self.index + 1,
        }
    }
}

/// Whether the upstream has more to give after the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    HasMore,
    Exhausted,
}

/// One listing page as returned by a source adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub entries: Vec<RawEntry>,
    pub state: Pagination,
}

impl Page {
    /// A page whose continuation is implied by whether anything was parsed.
    pub fn from_parsed(entries: Vec<RawEntry>) -> Self {
        let state = if entries.is_empty() {
            Pagination::Exhausted
        } else {
            Pagination::HasMore
        };
        Self { entries, state }
    }
}
