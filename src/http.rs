//! HTTP transport with optional exponential backoff.
//!
//! Everything that talks to the network goes through [`FetchAsync`], so the
//! retry policy lives in exactly one place:
//! - [`ReqwestFetcher`]: the real transport, one pooled `reqwest::Client`
//! - [`RetryFetch`]: decorator that retries retryable failures per [`RetryPolicy`]
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=jitter)
//! ```
//!
//! With `max_retries = 0` (the default) the first failure is returned
//! unchanged, which keeps a run all-or-nothing.

use crate::config::{FeedConfig, RetryPolicy};
use crate::error::{Error, Result};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Minimal transport surface the pipeline needs.
pub trait FetchAsync {
    /// GET `url` and return the body; non-2xx is [`Error::Status`].
    async fn get_text(&self, url: &str) -> Result<String>;

    /// POST `body` as JSON to `url` and decode the JSON reply.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value>;
}

/// The real transport.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build the pooled client every request of a run shares.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Per-request timeout, covering connect and body read
    /// * `user_agent` - Value of the `User-Agent` header
    ///
    /// # Returns
    ///
    /// The fetcher, or [`Error::Config`] if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn read_body(url: &str, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(|source| Error::Http {
            url: url.to_string(),
            source,
        })
    }
}

impl FetchAsync for ReqwestFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn get_text(&self, url: &str) -> Result<String> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| Error::Http {
                url: url.to_string(),
                source,
            })?;
        let body = Self::read_body(url, response).await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET ok"
        );
        Ok(body)
    }

    #[instrument(level = "debug", skip(self, body))]
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let t0 = Instant::now();
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| Error::Http {
                url: url.to_string(),
                source,
            })?;
        let text = Self::read_body(url, response).await?;
        debug!(
            bytes = text.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "POST ok"
        );
        serde_json::from_str(&text).map_err(|e| Error::Decode {
            url: url.to_string(),
            message: format!("{e}; body: {}", truncate_for_log(&text, 200)),
        })
    }
}

/// Wraps any [`FetchAsync`] and retries retryable failures.
pub struct RetryFetch<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryFetch<T>
where
    T: FetchAsync,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run<R, F, Fut>(&self, url: &str, op: F) -> Result<R>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            match op().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if !e.is_retryable() || attempt > self.policy.max_retries {
                        if self.policy.max_retries > 0 {
                            error!(
                                %url,
                                attempt,
                                max = self.policy.max_retries,
                                elapsed_ms_total = total_dt.as_millis() as u64,
                                error = %e,
                                "request failed; giving up"
                            );
                        }
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=self.policy.jitter_ms);
                    let delay = self.policy.backoff(attempt) + Duration::from_millis(jitter_ms);

                    warn!(
                        %url,
                        attempt,
                        max = self.policy.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "request failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> FetchAsync for RetryFetch<T>
where
    T: FetchAsync,
{
    async fn get_text(&self, url: &str) -> Result<String> {
        self.run(url, || self.inner.get_text(url)).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.run(url, || self.inner.post_json(url, body)).await
    }
}

/// The transport a run uses: pooled client wrapped in the configured retry policy.
pub fn build_fetcher(config: &FeedConfig) -> Result<RetryFetch<ReqwestFetcher>> {
    let inner = ReqwestFetcher::new(config.request_timeout(), &config.user_agent)?;
    Ok(RetryFetch::new(inner, config.retry.clone()))
}
