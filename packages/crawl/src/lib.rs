#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The livestock map crawl.
//!
//! [`BuildingPipeline`] turns one bounding box into stored buildings,
//! addresses and classified companies. [`CrawlOrchestrator`] drives the
//! pipeline over the persisted country tiles, recording each tile as
//! complete or failed so an interrupted crawl resumes where it stopped.
//! The [`maintenance`] functions re-derive stored data after the
//! classification or linking rules change.

pub mod config;
pub mod grid;
pub mod linking;
pub mod maintenance;
pub mod orchestrator;
pub mod pipeline;

#[cfg(test)]
mod fakes;

use livestock_map_database::DbError;
use livestock_map_osm::OsmError;
use livestock_map_registry::RegistryError;
use livestock_map_schedule::Cancelled;
use livestock_map_tiles::TileError;

pub use config::{ConfigError, CrawlConfig};
pub use grid::{GridSummary, create_country_tiles};
pub use orchestrator::{CrawlOrchestrator, RunSummary};
pub use pipeline::{BuildingPipeline, TileSummary};

/// Why a single tile (or region) could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Map data could not be fetched or decoded.
    #[error(transparent)]
    Osm(#[from] OsmError),

    /// A registry lookup or health check failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Buildings, addresses or companies could not be stored.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Shutdown was requested while the tile was in progress.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl PipelineError {
    /// The registry scraper returned wrong results for the reference
    /// address. The crawl cools down before claiming more work.
    #[must_use]
    pub const fn is_malfunction(&self) -> bool {
        matches!(self, Self::Registry(RegistryError::Malfunction { .. }))
    }

    /// The failure was caused by shutdown rather than the tile itself.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled(_) | Self::Registry(RegistryError::Cancelled(_))
        )
    }
}

/// Errors that stop a whole crawl run.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// The tile store could not record progress.
    #[error("Tile store failure: {0}")]
    Store(#[from] DbError),

    /// A region run failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The tile grid could not be generated.
    #[error(transparent)]
    Grid(#[from] TileError),
}
