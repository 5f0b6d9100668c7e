//! Cross-page collection: fetch until enough, dedupe, order, truncate.
//!
//! The loop runs while the source reports [`Pagination::HasMore`], fewer
//! than `max_items` unique articles are held, and the page budget is not
//! spent. A page that adds no new links ends collection as well, which
//! covers both empty pages and upstreams that repeat themselves.

use crate::enrich::Enricher;
use crate::error::Result;
use crate::http::FetchAsync;
use crate::models::{Article, PageCursor, Pagination, RawEntry};
use crate::scrapers::SourceAdapter;
use itertools::Itertools;
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Collection limits for one run.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_items: usize,
    pub max_pages: u32,
}

/// Drive `source` page by page and return at most `max_items` articles,
/// newest first, unique by link.
#[instrument(level = "info", skip_all, fields(max_items = limits.max_items))]
pub async fn collect<S, F>(source: &S, enricher: &Enricher<'_, F>, limits: Limits) -> Result<Vec<Article>>
where
    S: SourceAdapter,
    F: FetchAsync,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut articles: Vec<Article> = Vec::new();
    let mut cursor = PageCursor::first();
    let mut state = Pagination::HasMore;
    let mut pages = 0u32;

    while state == Pagination::HasMore && articles.len() < limits.max_items {
        if pages >= limits.max_pages {
            info!(pages, "Page budget spent; stopping collection");
            break;
        }

        let page = source.fetch_page(cursor).await?;
        pages += 1;
        let fetched = page.entries.len();

        let fresh: Vec<RawEntry> = page
            .entries
            .into_iter()
            .filter(|e| seen.insert(e.link.clone()))
            .collect();
        debug!(page = cursor.index, fetched, fresh = fresh.len(), "Deduplicated page");

        if fresh.is_empty() {
            info!(page = cursor.index, "Page added no new entries; listing exhausted");
            break;
        }

        let enriched = enricher.enrich(fresh).await?;
        articles.extend(enriched);
        info!(
            page = cursor.index,
            fetched,
            total = articles.len(),
            "Accumulated articles"
        );

        state = page.state;
        cursor = cursor.next();
    }

    let collected = articles.len();
    let articles = finalize(articles, limits.max_items);
    info!(pages, collected, kept = articles.len(), "Collection complete");
    Ok(articles)
}

/// Sort newest first on the publish instant and keep the first `max_items`.
///
/// The sort is stable, so equal instants keep collection order.
pub fn finalize(articles: Vec<Article>, max_items: usize) -> Vec<Article> {
    articles
        .into_iter()
        .unique_by(|a| a.link.clone())
        .sorted_by_key(|a| Reverse(a.published))
        .take(max_items)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnrichMode;
    use crate::error::Error;
    use crate::models::Page;
    use crate::scrapers::GraphqlSource;
    use crate::test_helpers::{StubFetcher, article_html};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    const ENDPOINT: &str = "https://hatena.blog/dev/api/graphql";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn limits() -> Limits {
        Limits {
            max_items: 30,
            max_pages: 50,
        }
    }

    fn link(n: usize) -> String {
        format!("https://hatena.blog/dev/entry/{n}")
    }

    /// A GraphQL stub with `sizes[i]` entries on page `i`. Entry `n` is
    /// published at `1_700_000_000 + n * 3600`, so a higher `n` is newer.
    fn graphql_stub(sizes: &[usize], page_size: usize) -> StubFetcher {
        let mut stub = StubFetcher::new();
        let mut n = 0usize;
        for (i, size) in sizes.iter().enumerate() {
            let entries: Vec<Value> = (n..n + size).map(stub_entry).collect();
            for id in n..n + size {
                stub = stub.with_page(&link(id), &article_html(1_700_000_000 + id as i64 * 3600));
            }
            n += size;
            let has_next = i + 1 < sizes.len();
            stub = stub.with_graphql(
                (i * page_size) as i64,
                json!({"data": {"recentEntries": {"entries": entries, "hasNextPage": has_next}}}),
            );
        }
        stub
    }

    fn stub_entry(id: usize) -> Value {
        json!({"id": id.to_string(), "title": format!("Post {id}"), "url": link(id),
               "created": null, "imageUrl": null})
    }

    #[tokio::test]
    async fn test_stops_once_threshold_reached() {
        let stub = graphql_stub(&[20, 20, 5], 20);
        let source = GraphqlSource::new(&stub, ENDPOINT.to_string(), 20);
        let enricher = Enricher::new(&stub, EnrichMode::Always, 4, now());

        let articles = collect(&source, &enricher, limits()).await.unwrap();

        assert_eq!(articles.len(), 30);
        assert_eq!(stub.count_calls("POST"), 2);
        assert!(!stub.calls().iter().any(|c| c.ends_with("skip=40")));
        assert_eq!(articles[0].link, link(39));
        assert_eq!(articles[29].link, link(10));
        assert!(articles.windows(2).all(|w| w[0].published >= w[1].published));
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_partial_collection() {
        let stub = graphql_stub(&[15], 20)
            .with_graphql(20, json!({"data": {"recentEntries": {"entries": [], "hasNextPage": false}}}));
        let source = GraphqlSource::new(&stub, ENDPOINT.to_string(), 20);
        let enricher = Enricher::new(&stub, EnrichMode::Always, 4, now());

        let articles = collect(&source, &enricher, limits()).await.unwrap();

        assert_eq!(articles.len(), 15);
        assert_eq!(stub.count_calls("POST"), 1);
    }

    #[tokio::test]
    async fn test_article_failure_aborts_collection() {
        let stub = graphql_stub(&[5], 20).with_status(&link(3), 500);
        let source = GraphqlSource::new(&stub, ENDPOINT.to_string(), 20);
        let enricher = Enricher::new(&stub, EnrichMode::Always, 1, now());

        let err = collect(&source, &enricher, limits()).await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 500, .. }));
    }

    /// Replays canned pages in order; answers empty once they run out.
    struct ScriptedSource {
        pages: Mutex<Vec<Page>>,
    }

    impl ScriptedSource {
        fn new(mut pages: Vec<Page>) -> Self {
            pages.reverse();
            Self {
                pages: Mutex::new(pages),
            }
        }
    }

    impl SourceAdapter for ScriptedSource {
        async fn fetch_page(&self, _cursor: PageCursor) -> Result<Page> {
            Ok(self
                .pages
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Page::from_parsed(vec![])))
        }
    }

    fn dated(n: usize, published: DateTime<Utc>) -> RawEntry {
        RawEntry {
            title: format!("Post {n}"),
            link: link(n),
            thumbnail: None,
            published: Some(published),
        }
    }

    #[tokio::test]
    async fn test_overlapping_pages_are_deduplicated() {
        let t = |h: u32| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap();
        let source = ScriptedSource::new(vec![
            Page::from_parsed(vec![dated(1, t(1)), dated(2, t(2)), dated(2, t(2))]),
            Page::from_parsed(vec![dated(2, t(2)), dated(3, t(3))]),
            Page::from_parsed(vec![dated(3, t(3))]),
        ]);
        let stub = StubFetcher::new();
        let enricher = Enricher::new(&stub, EnrichMode::Missing, 4, now());

        let articles = collect(&source, &enricher, limits()).await.unwrap();

        let links: Vec<_> = articles.iter().map(|a| a.link.clone()).collect();
        assert_eq!(links, vec![link(3), link(2), link(1)]);
        assert!(articles.iter().all(|a| a.guid() == a.link));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_page_budget_bounds_the_loop() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let source = ScriptedSource::new((0..10).map(|n| Page::from_parsed(vec![dated(n, t)])).collect());
        let stub = StubFetcher::new();
        let enricher = Enricher::new(&stub, EnrichMode::Never, 1, now());

        let articles = collect(
            &source,
            &enricher,
            Limits {
                max_items: 30,
                max_pages: 3,
            },
        )
        .await
        .unwrap();
        assert_eq!(articles.len(), 3);
    }

    #[test]
    fn test_finalize_orders_chronologically_not_lexically() {
        // "Wed, 01 ..." sorts above "Tue, 31 ..." as text even though it is later.
        let older = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mk = |n: usize, when| Article::from_entry(dated(n, when), when, false);

        let sorted = finalize(vec![mk(1, newer), mk(2, older)], 30);
        assert_eq!(sorted[0].published, newer);

        let sorted = finalize(vec![mk(2, older), mk(1, newer)], 30);
        assert_eq!(sorted[0].published, newer);
    }

    #[test]
    fn test_finalize_truncates_and_keeps_tie_order() {
        let when = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let articles: Vec<Article> = (0..40)
            .map(|n| Article::from_entry(dated(n, when), when, true))
            .collect();
        let kept = finalize(articles, 30);
        assert_eq!(kept.len(), 30);
        assert_eq!(kept[0].link, link(0));
        assert_eq!(kept[29].link, link(29));
    }
}
