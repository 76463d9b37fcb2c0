//! Exponential backoff for rate-limited backends and the JSON POST helper the
//! provider clients share.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{RagError, Result};

/// Bounded exponential backoff applied only to HTTP 429 responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    /// Delay after the first rate-limited attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(16),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `attempt`-th failed attempt (1-based).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. Exhaustion surfaces as [`RagError::RateLimited`].
    pub async fn run<T, F, Fut>(&self, service: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    if attempt >= max_attempts {
                        return Err(RagError::RateLimited {
                            service,
                            attempts: attempt,
                        });
                    }
                    let delay = self.backoff(attempt);
                    warn!(
                        service,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// POSTs `body` as JSON and decodes a JSON reply, retrying 429s per `policy`.
pub(crate) async fn post_json<B, R>(
    client: &reqwest::Client,
    endpoint: &str,
    body: &B,
    service: &'static str,
    policy: &RetryPolicy,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    policy
        .run(service, || async move {
            let resp = client
                .post(endpoint)
                .json(body)
                .send()
                .await
                .map_err(|err| RagError::upstream(service, err.to_string()))?;
            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(RagError::RateLimited {
                    service,
                    attempts: 1,
                });
            }
            if !status.is_success() {
                let text = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "<body unavailable>".to_string());
                return Err(RagError::upstream(service, format!("{status}: {text}")));
            }
            resp.json::<R>()
                .await
                .map_err(|err| RagError::upstream(service, format!("malformed response: {err}")))
        })
        .await
}
