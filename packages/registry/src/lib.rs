#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Business registry lookups.
//!
//! A [`RegistryLookup`] maps a free-text address to the companies registered
//! there. Bulk use always goes through a [`RegistryGateway`], which paces
//! requests to stay under the provider's abuse threshold and periodically
//! verifies a reference address so that a broken scraper fails fast instead
//! of silently returning empty results.

pub mod gateway;
pub mod uittreksel;

use async_trait::async_trait;
use livestock_map_building_models::RegistryEntry;
use livestock_map_http::HttpError;
use livestock_map_schedule::Cancelled;

pub use gateway::{RegistryGateway, RegistryPolicy};
pub use uittreksel::UittrekselRegisterClient;

/// Errors from registry lookups.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The request could not be completed.
    #[error("Registry request failed: {0}")]
    Transport(#[from] HttpError),

    /// The health check returned an unexpected number of results.
    #[error(
        "Registry scraper malfunction: expected {expected} results for the reference address, got {actual}"
    )]
    Malfunction {
        /// Results the reference address should yield.
        expected: usize,
        /// Results it actually yielded.
        actual: usize,
    },

    /// A pacing wait was aborted by shutdown.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Looks up the companies registered at an address.
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    /// Returns every registered company with a non-empty description.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Transport`] on any non-success response.
    async fn lookup(&self, address: &str) -> Result<Vec<RegistryEntry>, RegistryError>;
}
