//! GraphQL listing adapter.
//!
//! Pages through `recentEntries(skip, limit)` and follows the server's
//! `hasNextPage` flag. The `created` field is kept as the entry's listing
//! timestamp when it parses; whether it is trusted is the enricher's call.

use super::{SourceAdapter, normalize_entry};
use crate::error::{Error, Result};
use crate::http::FetchAsync;
use crate::models::{Page, PageCursor, Pagination, RawEntry};
use crate::utils::parse_timestamp;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

const ENTRIES_QUERY: &str = r#"
query EntriesQuery($skip: Int, $limit: Int!) {
  recentEntries(skip: $skip, limit: $limit) {
    entries {
      id
      title
      url
      created
      imageUrl
    }
    hasNextPage
  }
}
"#;

#[derive(Debug, Deserialize)]
struct EntriesResponse {
    #[serde(default)]
    data: Option<EntriesData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntriesData {
    #[serde(default)]
    recent_entries: Option<RecentEntries>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentEntries {
    #[serde(default)]
    entries: Option<Vec<ApiEntry>>,
    #[serde(default)]
    has_next_page: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEntry {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    created: Option<Value>,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// Adapter for a `recentEntries` GraphQL endpoint.
pub struct GraphqlSource<'a, F> {
    fetcher: &'a F,
    endpoint: String,
    page_size: u32,
}

impl<'a, F> GraphqlSource<'a, F>
where
    F: FetchAsync,
{
    pub fn new(fetcher: &'a F, endpoint: String, page_size: u32) -> Self {
        Self {
            fetcher,
            endpoint,
            page_size,
        }
    }

    fn request_body(&self, cursor: PageCursor) -> Value {
        let skip = i64::from(cursor.index) * i64::from(self.page_size);
        json!({
            "query": ENTRIES_QUERY,
            "operationName": "EntriesQuery",
            "variables": {
                "skip": skip,
                "limit": self.page_size,
            }
        })
    }
}

impl<F> SourceAdapter for GraphqlSource<'_, F>
where
    F: FetchAsync,
{
    #[instrument(level = "info", skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_page(&self, cursor: PageCursor) -> Result<Page> {
        let body = self.request_body(cursor);
        let value = self.fetcher.post_json(&self.endpoint, &body).await?;
        let page = parse_response(&self.endpoint, value)?;
        info!(
            page = cursor.index,
            count = page.entries.len(),
            state = ?page.state,
            "Fetched GraphQL listing page"
        );
        Ok(page)
    }
}

fn parse_response(endpoint: &str, value: Value) -> Result<Page> {
    let response: EntriesResponse =
        serde_json::from_value(value).map_err(|e| Error::Decode {
            url: endpoint.to_string(),
            message: e.to_string(),
        })?;

    if !response.errors.is_empty() {
        return Err(Error::Graphql {
            url: endpoint.to_string(),
            message: response.errors.iter().map(|e| e.message.as_str()).join("; "),
        });
    }

    let recent = response.data.and_then(|d| d.recent_entries);
    let (entries, has_next) = match recent {
        Some(r) => (r.entries.unwrap_or_default(), r.has_next_page.unwrap_or(false)),
        None => (Vec::new(), false),
    };

    let entries: Vec<RawEntry> = entries
        .into_iter()
        .filter_map(|e| {
            let raw = RawEntry {
                title: e.title.unwrap_or_default(),
                link: e.url.unwrap_or_default(),
                thumbnail: e.image_url,
                published: e.created.as_ref().and_then(parse_created),
            };
            normalize_entry(raw, None)
        })
        .collect();
    debug!(count = entries.len(), has_next, "Parsed GraphQL entries");

    let state = if has_next && !entries.is_empty() {
        Pagination::HasMore
    } else {
        Pagination::Exhausted
    };
    Ok(Page { entries, state })
}

fn parse_created(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}
