//! Persisted work units of the country-wide crawl.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::BoundingBox;

/// Maximum number of characters of error text stored on a failed tile.
pub const MAX_TILE_ERROR_CHARS: usize = 9500;

/// Database identifier of a [`Tile`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TileId(pub i64);

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a tile.
///
/// `Pending -> InProgress -> Complete | Failed`. A worker claims a tile by
/// moving it to `InProgress`; an interrupted tile goes back to `Pending`.
/// `Failed` tiles only return to `Pending` through an explicit re-queue.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TileStatus {
    /// Waiting to be crawled.
    Pending,
    /// Claimed by a worker.
    InProgress,
    /// Crawled successfully.
    Complete,
    /// Crawl failed; see [`Tile::error_message`].
    Failed,
}

/// A rectangular unit of crawl work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Database id.
    pub id: TileId,
    /// Covered area.
    pub bbox: BoundingBox,
    /// Grid level the tile was generated at.
    pub level: u32,
    /// Current lifecycle state.
    pub status: TileStatus,
    /// Truncated error text of the last failure; empty otherwise.
    pub error_message: String,
    /// Wall-clock time spent on the last successful crawl.
    pub duration_seconds: Option<f64>,
    /// Number of large buildings found.
    pub building_count: Option<u64>,
    /// Number of companies found.
    pub company_count: Option<u64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Result of successfully crawling a tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileOutcome {
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
    /// Number of large buildings found.
    pub building_count: u64,
    /// Number of companies found.
    pub company_count: u64,
}

/// Truncates error text to [`MAX_TILE_ERROR_CHARS`] characters.
#[must_use]
pub fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_TILE_ERROR_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_errors_on_char_boundaries() {
        let long = "é".repeat(MAX_TILE_ERROR_CHARS + 10);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.chars().count(), MAX_TILE_ERROR_CHARS);
    }

    #[test]
    fn keeps_short_errors() {
        assert_eq!(truncate_error("boom"), "boom");
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        assert_eq!(TileStatus::InProgress.as_ref(), "IN_PROGRESS");
        assert_eq!("FAILED".parse::<TileStatus>().unwrap(), TileStatus::Failed);
        assert_eq!(
            serde_json::to_string(&TileStatus::Pending).unwrap(),
            "\"PENDING\""
        );
    }

    #[test]
    fn unknown_status_is_a_parse_error() {
        assert_eq!(
            "DONE".parse::<TileStatus>(),
            Err(strum::ParseError::VariantNotFound)
        );
    }
}
