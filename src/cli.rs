//! Command-line interface definitions.
//!
//! Every flag is optional: a bare invocation runs the built-in Hatena
//! Developer Blog feed. Flags override the YAML config file when both are
//! given.

use crate::config::{EnrichMode, FeedConfig};
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Built-in defaults, writes ./hatena_dev_entries.xml
/// hatena_feed
///
/// # Another source described in YAML, with retries
/// hatena_feed --config feeds/dev.yaml --retries 3
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Feed file to write
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum number of items kept in the feed
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Retries per request on transient failures (0 = fail fast)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Skip article-page fetches and date undated entries with the current time
    #[arg(long)]
    pub no_enrich: bool,
}

impl Cli {
    /// Resolve the effective configuration: file (or defaults), then flags.
    pub async fn into_config(self) -> Result<FeedConfig> {
        let mut config = match &self.config {
            Some(path) => FeedConfig::load(path).await?,
            None => FeedConfig::default(),
        };
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(max_items) = self.max_items {
            config.max_items = max_items;
        }
        if let Some(retries) = self.retries {
            config.retry.max_retries = retries;
        }
        if self.no_enrich {
            config.enrich = EnrichMode::Never;
        }
        config.validate()?;
        Ok(config)
    }
}
