//! Output generation.
//!
//! # Submodules
//!
//! - [`rss`]: renders the collected articles as an RSS 2.0 document and
//!   replaces the feed file atomically
//!
//! # Output Structure
//!
//! ```text
//! hatena_dev_entries.xml      # the feed, fully replaced on success
//! hatena_dev_entries.xml.tmp  # exists only while a write is in flight
//! ```

pub mod rss;
