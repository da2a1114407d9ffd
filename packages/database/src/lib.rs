#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persistence for the livestock map.
//!
//! The crawl only needs upserts by natural key plus a handful of status
//! updates, expressed as the repository traits below. [`MemoryStore`] keeps
//! everything in process (tests, one-off region runs); [`DuckDbStore`]
//! persists to a single `DuckDB` file under `data/`.

pub mod duck;
pub mod memory;
pub mod paths;

use livestock_map_building_models::{
    Address, BoundingBox, BuildingRecord, CompanyKey, CompanyRecord, Tile, TileId, TileOutcome,
};

pub use duck::DuckDbStore;
pub use memory::MemoryStore;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error (creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON column encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored value could not be converted back into a model type.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// An update targeted a row that does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// What was looked up.
        message: String,
    },
}

/// Persisted crawl tiles.
pub trait TileRepository: Send + Sync {
    /// Returns the tile with exactly this bbox and level, creating a
    /// `Pending` one if none exists. The flag is `true` if it was created.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn upsert_tile(&self, bbox: &BoundingBox, level: u32) -> Result<(Tile, bool), DbError>;

    /// Atomically moves the lowest-id `Pending` tile to `InProgress` and
    /// returns it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn claim_next_pending(&self) -> Result<Option<Tile>, DbError>;

    /// Returns an `InProgress` tile to `Pending`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails or the tile does not exist.
    fn release_tile(&self, id: TileId) -> Result<(), DbError>;

    /// Marks a tile `Complete` with its counts, clearing any error.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails or the tile does not exist.
    fn complete_tile(&self, id: TileId, outcome: &TileOutcome) -> Result<(), DbError>;

    /// Marks a tile `Failed` with the (already truncated) error text.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails or the tile does not exist.
    fn fail_tile(&self, id: TileId, error: &str, duration_seconds: f64) -> Result<(), DbError>;

    /// Moves every `Failed` tile back to `Pending`, returning how many.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn requeue_failed(&self) -> Result<u64, DbError>;

    /// Moves tiles left `InProgress` by an interrupted process back to
    /// `Pending`, returning how many.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn reset_in_progress(&self) -> Result<u64, DbError>;

    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn tile(&self, id: TileId) -> Result<Option<Tile>, DbError>;

    /// All tiles ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn tiles(&self) -> Result<Vec<Tile>, DbError>;

    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn delete_all_tiles(&self) -> Result<u64, DbError>;
}

/// Addresses keyed by external id.
pub trait AddressRepository: Send + Sync {
    /// Inserts or refreshes an address by external id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn upsert_address(&self, address: &Address) -> Result<(), DbError>;

    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn address(&self, external_id: i64) -> Result<Option<Address>, DbError>;

    /// The addresses with the given ids, in the given order. Unknown ids are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn addresses(&self, external_ids: &[i64]) -> Result<Vec<Address>, DbError>;
}

/// Buildings keyed by provider id.
pub trait BuildingRepository: Send + Sync {
    /// Inserts or replaces a building by provider id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn upsert_building(&self, record: &BuildingRecord) -> Result<(), DbError>;

    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn building(&self, id: i64) -> Result<Option<BuildingRecord>, DbError>;

    /// All buildings ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn buildings(&self) -> Result<Vec<BuildingRecord>, DbError>;

    /// Buildings whose linked company is `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn buildings_linked_to(&self, key: &CompanyKey) -> Result<Vec<BuildingRecord>, DbError>;

    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn delete_all_buildings(&self) -> Result<u64, DbError>;
}

/// Classified companies keyed by (address id, description).
pub trait CompanyRepository: Send + Sync {
    /// Inserts or updates a company by natural key. An update keeps the
    /// company's original position in [`Self::companies_at`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn upsert_company(&self, record: &CompanyRecord) -> Result<(), DbError>;

    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn company(&self, key: &CompanyKey) -> Result<Option<CompanyRecord>, DbError>;

    /// Companies registered at an address, in the order first stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn companies_at(&self, address_id: i64) -> Result<Vec<CompanyRecord>, DbError>;

    /// All companies, in the order first stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn companies(&self) -> Result<Vec<CompanyRecord>, DbError>;

    /// Deletes companies with an empty description, returning how many.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store fails.
    fn delete_companies_without_description(&self) -> Result<u64, DbError>;
}

/// Everything the crawl persists.
pub trait Repository:
    TileRepository + AddressRepository + BuildingRepository + CompanyRepository
{
}

impl<T> Repository for T where
    T: TileRepository + AddressRepository + BuildingRepository + CompanyRepository
{
}

fn not_found(what: impl std::fmt::Display) -> DbError {
    DbError::NotFound {
        message: what.to_string(),
    }
}

#[cfg(test)]
mod conformance;
