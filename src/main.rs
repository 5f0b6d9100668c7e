//! # Hatena Feed
//!
//! Harvests the Hatena Developer Blog article index and publishes the
//! newest entries as a fixed-size RSS 2.0 file.
//!
//! ## Usage
//!
//! ```sh
//! hatena_feed                      # writes ./hatena_dev_entries.xml
//! hatena_feed -c feeds/other.yaml  # another source or target
//! ```
//!
//! ## Architecture
//!
//! 1. **Listing**: a source adapter pages through the upstream index
//!    (GraphQL `recentEntries` or `?page=N` HTML)
//! 2. **Enrichment**: each new entry's own page supplies its publish time
//! 3. **Aggregation**: collection stops at `max_items` or exhaustion, then
//!    entries are deduplicated by link, sorted newest first and truncated
//! 4. **Output**: the feed file is atomically replaced
//!
//! A run is all-or-nothing. Any failed request aborts it before the feed
//! file is touched, and the process exits non-zero so a scheduler notices.

use clap::Parser;
use std::error::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod cli;
mod config;
mod enrich;
mod error;
mod http;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
#[cfg(test)]
mod test_helpers;
mod utils;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "hatena_feed starting up");

    let args = Cli::parse();
    let config = match args.into_config().await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration rejected");
            return Err(e.into());
        }
    };
    info!(
        output = %config.output_path.display(),
        max_items = config.max_items,
        enrich = ?config.enrich,
        retries = config.retry.max_retries,
        "Configuration resolved"
    );

    match pipeline::run(&config).await {
        Ok(summary) => {
            let elapsed = start_time.elapsed();
            info!(
                items = summary.items,
                inferred_dates = summary.inferred,
                path = %summary.output.display(),
                ?elapsed,
                "Feed generated"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Feed generation failed; previous feed left untouched");
            Err(e.into())
        }
    }
}
