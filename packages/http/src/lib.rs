#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP plumbing shared by the map-data provider and the registry client.
//!
//! Every outbound request goes through [`retry::send_text`] or
//! [`retry::send_json`], which retry transient failures (timeouts,
//! connection resets, HTTP 429 and 5xx) with exponential backoff and give
//! up after a bounded number of attempts.

pub mod retry;

use std::time::Duration;

pub use retry::RetryPolicy;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("livestock_map/", env!("CARGO_PKG_VERSION"));

/// Errors from an HTTP exchange after retries have been exhausted.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Numeric status code.
        status: u16,
        /// Context for the failure.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode response: {message}")]
    Decode {
        /// Decoder error and a body preview.
        message: String,
    },
}

impl HttpError {
    /// Whether this error came from the network or a retryable status
    /// rather than from the content of a successful response.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode { .. } => false,
        }
    }
}

/// Builds a [`reqwest::Client`] with the crate user agent and the given
/// per-request timeout.
///
/// # Errors
///
/// Returns [`HttpError::Request`] if the TLS backend cannot be initialized.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, HttpError> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}
