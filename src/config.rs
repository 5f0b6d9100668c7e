//! Run configuration.
//!
//! A [`FeedConfig`] is built once at startup and handed to the pipeline by
//! reference. [`FeedConfig::default`] is the Hatena Developer Blog feed; a
//! YAML file can describe another source or target with the same pipeline.
//!
//! # Example
//!
//! ```yaml
//! output_path: public/dev.xml
//! max_items: 30
//! enrich: missing
//! source:
//!   mode: html
//!   listing_url: https://hatena.blog/dev/entries
//! retry:
//!   max_retries: 3
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// Everything a single run needs to know.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Where the upstream index comes from.
    pub source: SourceConfig,
    /// When to fetch article pages for a publish timestamp.
    pub enrich: EnrichMode,
    /// How many article pages may be fetched at once within one listing page.
    pub enrich_concurrency: usize,
    /// Collection stops once this many unique articles are held; also the feed cap.
    pub max_items: usize,
    /// Upper bound on listing pages requested per run.
    pub max_pages: u32,
    /// Destination file, replaced on every successful run.
    pub output_path: PathBuf,
    /// Channel-level metadata.
    pub feed: FeedMeta,
    pub retry: RetryPolicy,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            enrich: EnrichMode::Always,
            enrich_concurrency: 4,
            max_items: 30,
            max_pages: 50,
            output_path: PathBuf::from("hatena_dev_entries.xml"),
            feed: FeedMeta::default(),
            retry: RetryPolicy::default(),
            request_timeout_secs: 30,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FeedConfig {
    /// Load a YAML config file. Fields absent from the file keep their defaults.
    ///
    /// The result is not validated here; callers apply their overrides first
    /// and then call [`FeedConfig::validate`].
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config: FeedConfig = serde_yaml::from_str(&raw)?;
        info!("Loaded configuration");
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_items == 0 {
            return Err(Error::Config("max_items must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(Error::Config("max_pages must be at least 1".into()));
        }
        if self.enrich_concurrency == 0 {
            return Err(Error::Config("enrich_concurrency must be at least 1".into()));
        }
        if let SourceConfig::Graphql { page_size: 0, .. } = self.source {
            return Err(Error::Config("page_size must be at least 1".into()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::Config("output_path must not be empty".into()));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(Error::Config(
                "retry.max_delay_ms must not be below retry.base_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Upstream listing strategy.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A GraphQL `recentEntries(skip, limit)` endpoint.
    Graphql {
        endpoint: String,
        #[serde(default = "default_page_size")]
        page_size: u32,
    },
    /// Paginated HTML listing pages, requested as `listing_url?page=N`.
    Html {
        listing_url: String,
        #[serde(default = "default_entry_selector")]
        entry_selector: String,
        #[serde(default = "default_link_selector")]
        link_selector: String,
        /// Defaults to the link element's own text when absent.
        #[serde(default)]
        title_selector: Option<String>,
        #[serde(default = "default_thumbnail_selector")]
        thumbnail_selector: Option<String>,
        /// An element carrying a `datetime` attribute.
        #[serde(default = "default_time_selector")]
        time_selector: Option<String>,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Graphql {
            endpoint: "https://hatena.blog/dev/api/graphql".to_string(),
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_entry_selector() -> String {
    "section.archive-entry".to_string()
}

fn default_link_selector() -> String {
    "a.entry-title-link".to_string()
}

fn default_thumbnail_selector() -> Option<String> {
    Some("img.entry-thumb".to_string())
}

fn default_time_selector() -> Option<String> {
    Some("time[datetime]".to_string())
}

/// When the enricher fetches an article's own page.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnrichMode {
    /// Every entry, ignoring any timestamp the listing supplied.
    Always,
    /// Only entries the listing gave no timestamp for.
    Missing,
    /// Never; entries without a listing timestamp get the run's "now".
    Never,
}

/// Channel-level feed metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedMeta {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
}

impl Default for FeedMeta {
    fn default() -> Self {
        Self {
            title: "Hatena Dev Entries".to_string(),
            link: "https://hatena.blog/dev/entries".to_string(),
            description: "最新のHatena Devブログ記事".to_string(),
            language: "ja".to_string(),
        }
    }
}

/// Backoff settings for outbound requests. `max_retries: 0` is fail-fast.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_hatena_feed() {
        let config = FeedConfig::default();
        assert_eq!(config.max_items, 30);
        assert_eq!(config.output_path, PathBuf::from("hatena_dev_entries.xml"));
        assert_eq!(config.enrich, EnrichMode::Always);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.feed.language, "ja");
        assert_eq!(
            config.source,
            SourceConfig::Graphql {
                endpoint: "https://hatena.blog/dev/api/graphql".to_string(),
                page_size: 20,
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_html_source_with_defaults() {
        let yaml = r#"
output_path: out/feed.xml
max_items: 10
enrich: missing
source:
  mode: html
  listing_url: https://example.com/entries
retry:
  max_retries: 2
"#;
        let config: FeedConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_items, 10);
        assert_eq!(config.enrich, EnrichMode::Missing);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.feed.title, "Hatena Dev Entries");
        match config.source {
            SourceConfig::Html {
                listing_url,
                entry_selector,
                title_selector,
                ..
            } => {
                assert_eq!(listing_url, "https://example.com/entries");
                assert_eq!(entry_selector, "section.archive-entry");
                assert!(title_selector.is_none());
            }
            other => panic!("expected html source, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_caps() {
        let config = FeedConfig {
            max_items: 0,
            ..FeedConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = FeedConfig {
            source: SourceConfig::Graphql {
                endpoint: "https://example.com/graphql".to_string(),
                page_size: 0,
            },
            ..FeedConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter_ms: 0,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(80), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.yaml");
        tokio::fs::write(&path, "max_items: 5\n").await.unwrap();
        let config = FeedConfig::load(&path).await.unwrap();
        assert_eq!(config.max_items, 5);
        assert_eq!(config.enrich_concurrency, 4);
    }

    #[tokio::test]
    async fn test_load_leaves_validation_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.yaml");
        tokio::fs::write(&path, "max_items: 0\n").await.unwrap();
        let config = FeedConfig::load(&path).await.unwrap();
        assert_eq!(config.max_items, 0);
        assert!(config.validate().is_err());
    }
}
