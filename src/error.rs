//! Error taxonomy for a feed run.
//!
//! Every failure is fatal to the run: nothing here is recovered from except
//! by the optional retry decorator in [`crate::http`], which consults
//! [`Error::is_retryable`].

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (DNS, connect, timeout, body read).
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body did not have the shape we expected.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The GraphQL endpoint reported errors in its payload.
    #[error("GraphQL error from {url}: {message}")]
    Graphql { url: String, message: String },

    #[error("invalid CSS selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Nothing was collected; the previous feed is left in place.
    #[error("no articles collected; refusing to replace the existing feed")]
    EmptyFeed,

    #[error("failed to serialize feed: {0}")]
    Xml(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether a retry could plausibly succeed.
    ///
    /// Transport failures, `429 Too Many Requests` and server errors qualify.
    /// Client errors and malformed payloads do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http { .. } => true,
            Error::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
