//! HTTP retry helpers for transient errors.
//!
//! Callers pass a closure that builds a fresh [`reqwest::RequestBuilder`]
//! on every attempt, since builders are consumed by `.send()`:
//!
//! ```ignore
//! let html = retry::send_text(&policy, || client.get(&url).query(&[("q", text)])).await?;
//! let body: Response = retry::send_json(&policy, || client.post(&url).form(&form)).await?;
//! ```

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::HttpError;

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 500;

/// Bounds on how often and how patiently a request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt for connection errors, timeouts,
    /// HTTP 429 and HTTP 5xx.
    pub max_retries: u32,
    /// Full re-fetches when a successful response body cannot be read or
    /// decoded.
    pub max_body_retries: u32,
    /// Backoff unit; attempt `n` waits `base_delay * 2^n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// 5 retries with 2s, 4s, 8s, 16s, 32s backoff (62 seconds total).
    fn default() -> Self {
        Self {
            max_retries: 5,
            max_body_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            max_body_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

/// Sends a request and decodes the response body as JSON into `T`.
///
/// Connection-level failures are retried inside [`send_inner`]. A body
/// that arrives but fails to decode triggers a full re-fetch, up to
/// [`RetryPolicy::max_body_retries`] times.
///
/// # Errors
///
/// Returns [`HttpError`] if the request fails after all retries, the server
/// returns a non-retryable status, or the body never decodes.
#[allow(clippy::future_not_send)]
pub async fn send_json<T, F>(policy: &RetryPolicy, build_request: F) -> Result<T, HttpError>
where
    T: DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut body_attempt = 0;
    loop {
        let text = send_text(policy, &build_request).await?;

        match serde_json::from_str(&text) {
            Ok(value) => return Ok(value),
            Err(e) => {
                let preview = preview(&text);
                if body_attempt < policy.max_body_retries {
                    body_attempt += 1;
                    let delay = policy.delay_for(body_attempt);
                    log::warn!(
                        "JSON decode failed (body retry {body_attempt}/{}), \
                         re-fetching in {delay:?}...\n  \
                         received: {} bytes\n  \
                         error: {e}\n  \
                         body preview: {preview}",
                        policy.max_body_retries,
                        text.len(),
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                log::error!(
                    "JSON decode failed after {} body retries: {e}\n  body preview: {preview}",
                    policy.max_body_retries,
                );
                return Err(HttpError::Decode {
                    message: format!("{e} (received {} bytes: {preview})", text.len()),
                });
            }
        }
    }
}

/// Sends a request and returns the response body as a `String`.
///
/// # Errors
///
/// Returns [`HttpError`] if the request fails after all retries or the body
/// cannot be read after all body retries.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(policy: &RetryPolicy, build_request: F) -> Result<String, HttpError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut body_attempt = 0;
    loop {
        let response = send_inner(policy, &build_request).await?;
        let url = response.url().to_string();
        let status = response.status();

        match response.text().await {
            Ok(text) => return Ok(text),
            Err(e) => {
                if body_attempt < policy.max_body_retries {
                    body_attempt += 1;
                    let delay = policy.delay_for(body_attempt);
                    log::warn!(
                        "Body read failed (body retry {body_attempt}/{}), \
                         re-fetching in {delay:?}...\n  \
                         url: {url}\n  \
                         status: {status}\n  \
                         error: {e}",
                        policy.max_body_retries,
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                log::error!("Body read failed for {url} ({status}), giving up: {e}");
                return Err(HttpError::Request(e));
            }
        }
    }
}

/// Core retry loop shared by [`send_json`] and [`send_text`]. Returns the
/// first 2xx/3xx response.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    policy: &RetryPolicy,
    build_request: &F,
) -> Result<reqwest::Response, HttpError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_retries = policy.max_retries;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(HttpError::Request(e));
            }
            Ok(response) => {
                let status = response.status();

                if is_retryable_status(status) {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status} from {}", response.url());
                        attempt += 1;
                        continue;
                    }
                    return Err(HttpError::Status {
                        status: status.as_u16(),
                        message: format!("giving up after {max_retries} retries"),
                    });
                }

                if status.is_client_error() {
                    return Err(HttpError::Status {
                        status: status.as_u16(),
                        message: format!("request to {} rejected", response.url()),
                    });
                }

                return Ok(response);
            }
        }
    }
}

/// HTTP 429 and every 5xx are worth retrying; other 4xx are permanent.
#[must_use]
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

fn preview(text: &str) -> String {
    if text.chars().count() > BODY_PREVIEW_LEN {
        format!("{}...", text.chars().take(BODY_PREVIEW_LEN).collect::<String>())
    } else {
        text.to_string()
    }
}
