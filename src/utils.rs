//! Small helpers shared by the adapters, the enricher and the emitter.
//!
//! - Log-safe truncation of response bodies
//! - Lenient timestamp parsing (epoch seconds or RFC 3339)
//! - RFC-822 formatting for feed dates
//! - Output directory preparation

use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// RSS `pubDate` layout, always rendered in UTC.
pub const RFC822_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Truncate a string for logging purposes.
///
/// Cuts on a character boundary so multi-byte text (Japanese titles, for
/// instance) never panics.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Parse a timestamp given either as Unix epoch seconds or as RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Render an instant as `Day, DD Mon YYYY HH:MM:SS +0000`.
pub fn format_rfc822(when: &DateTime<Utc>) -> String {
    when.format(RFC822_FORMAT).to_string()
}

/// Make sure the directory that will hold `path` exists.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).await?;
            debug!(parent = %parent.display(), "Output directory ready");
            Ok(())
        }
        _ => Ok(()),
    }
}
