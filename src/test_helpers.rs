//! Scripted in-memory transport for adapter, enricher and aggregator tests.

use crate::error::{Error, Result};
use crate::http::FetchAsync;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Answers GETs by exact URL and GraphQL POSTs by `variables.skip`.
///
/// Unknown URLs answer 404. Every request is recorded in order.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, std::result::Result<String, u16>>,
    graphql: HashMap<i64, Value>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), Err(status));
        self
    }

    pub fn with_graphql(mut self, skip: i64, response: Value) -> Self {
        self.graphql.insert(skip, response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

impl FetchAsync for StubFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(format!("GET {url}"));
        match self.pages.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(Error::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(Error::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let skip = body["variables"]["skip"].as_i64().unwrap_or(0);
        self.calls
            .lock()
            .unwrap()
            .push(format!("POST {url} skip={skip}"));
        self.graphql.get(&skip).cloned().ok_or(Error::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// An article page carrying the published-time marker.
pub fn article_html(epoch: i64) -> String {
    format!(
        r#"<html><head><meta property="article:published_time" content="{epoch}"></head><body></body></html>"#
    )
}
