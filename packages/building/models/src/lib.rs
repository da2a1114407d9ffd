#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Building, address, company, and tile types.
//!
//! These are the plain data types shared by every stage of the livestock
//! map pipeline: raw map-provider buildings and their derived footprint
//! metrics, street addresses found near a building, registry companies with
//! their livestock classification, and the persisted crawl [`Tile`]s.

pub mod address;
pub mod company;
pub mod tile;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use address::{Address, AddressKey, AddressNode};
pub use company::{
    AnimalFlags, AnimalType, ClassifiedCompany, CompanyKey, CompanyRecord, RegistryEntry,
};
pub use tile::{MAX_TILE_ERROR_CHARS, Tile, TileId, TileOutcome, TileStatus, truncate_error};

/// Error returned when a bounding box does not satisfy
/// `lon_min < lon_max` and `lat_min < lat_max`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidBoundingBox {
    /// Longitude range is empty or inverted.
    #[error("invalid longitude range: {lon_min} >= {lon_max}")]
    Longitude {
        /// Western edge.
        lon_min: f64,
        /// Eastern edge.
        lon_max: f64,
    },
    /// Latitude range is empty or inverted.
    #[error("invalid latitude range: {lat_min} >= {lat_max}")]
    Latitude {
        /// Southern edge.
        lat_min: f64,
        /// Northern edge.
        lat_max: f64,
    },
    /// A coordinate could not be parsed.
    #[error("invalid bounding box '{input}': {message}")]
    Parse {
        /// The raw input.
        input: String,
        /// Description of the parse failure.
        message: String,
    },
}

/// An axis-aligned latitude/longitude rectangle, in degrees.
///
/// Deserialization goes through [`BoundingBox::new`], so stored boxes are
/// validated the same way as constructed ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    lon_min: f64,
    lon_max: f64,
    lat_min: f64,
    lat_max: f64,
}

#[derive(Deserialize)]
struct RawBoundingBox {
    lon_min: f64,
    lon_max: f64,
    lat_min: f64,
    lat_max: f64,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = InvalidBoundingBox;

    fn try_from(raw: RawBoundingBox) -> Result<Self, Self::Error> {
        Self::new(raw.lon_min, raw.lon_max, raw.lat_min, raw.lat_max)
    }
}

impl BoundingBox {
    /// Creates a bounding box, validating that both ranges are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoundingBox`] if `lon_min >= lon_max` or
    /// `lat_min >= lat_max` (NaN coordinates are rejected too).
    pub fn new(
        lon_min: f64,
        lon_max: f64,
        lat_min: f64,
        lat_max: f64,
    ) -> Result<Self, InvalidBoundingBox> {
        if lon_min.partial_cmp(&lon_max) != Some(Ordering::Less) {
            return Err(InvalidBoundingBox::Longitude { lon_min, lon_max });
        }
        if lat_min.partial_cmp(&lat_max) != Some(Ordering::Less) {
            return Err(InvalidBoundingBox::Latitude { lat_min, lat_max });
        }
        Ok(Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        })
    }

    /// Western edge.
    #[must_use]
    pub const fn lon_min(&self) -> f64 {
        self.lon_min
    }

    /// Eastern edge.
    #[must_use]
    pub const fn lon_max(&self) -> f64 {
        self.lon_max
    }

    /// Southern edge.
    #[must_use]
    pub const fn lat_min(&self) -> f64 {
        self.lat_min
    }

    /// Northern edge.
    #[must_use]
    pub const fn lat_max(&self) -> f64 {
        self.lat_max
    }

    /// Width of the box in degrees of longitude.
    #[must_use]
    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    /// Height of the box in degrees of latitude.
    #[must_use]
    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Returns `true` if the point lies inside or on the edge of the box.
    #[must_use]
    pub fn contains(&self, point: LatLon) -> bool {
        point.lat >= self.lat_min
            && point.lat <= self.lat_max
            && point.lon >= self.lon_min
            && point.lon <= self.lon_max
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.lon_min, self.lon_max, self.lat_min, self.lat_max
        )
    }
}

/// Parses `"lon_min,lat_min,lon_max,lat_max"`.
impl FromStr for BoundingBox {
    type Err = InvalidBoundingBox;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| InvalidBoundingBox::Parse {
                input: s.to_string(),
                message: e.to_string(),
            })?;

        let [lon_min, lat_min, lon_max, lat_max] = values[..] else {
            return Err(InvalidBoundingBox::Parse {
                input: s.to_string(),
                message: format!("expected 4 values, got {}", values.len()),
            });
        };

        Self::new(lon_min, lon_max, lat_min, lat_max)
    }
}

/// A geodetic point (WGS84 degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl LatLon {
    /// Creates a point from latitude and longitude.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A building outline as returned by the map-data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBuilding {
    /// Provider-assigned identifier (OSM way id).
    pub id: i64,
    /// Free-form provider tags (e.g. `building=farm_auxiliary`).
    pub tags: BTreeMap<String, String>,
    /// Ordered outer ring of the footprint.
    pub geometry: Vec<LatLon>,
}

impl RawBuilding {
    /// Value of the `building` tag, if any.
    #[must_use]
    pub fn building_type(&self) -> Option<&str> {
        self.tags.get("building").map(String::as_str)
    }
}

/// Footprint metrics derived from a [`RawBuilding`], in meters.
///
/// `length_meters >= width_meters` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BuildingMetrics {
    /// Planar area in square meters.
    pub area_square_meters: f64,
    /// Long side of the minimum-area bounding rectangle.
    pub length_meters: f64,
    /// Short side of the minimum-area bounding rectangle.
    pub width_meters: f64,
}

/// A stored building: the raw outline plus everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    /// The provider outline.
    pub building: RawBuilding,
    /// Footprint metrics.
    pub metrics: BuildingMetrics,
    /// External ids of nearby addresses, nearest first.
    pub nearby_addresses: Vec<i64>,
    /// The livestock company this building is attributed to.
    pub linked_company: Option<CompanyKey>,
}

impl BuildingRecord {
    /// Creates a record with no addresses or company attached yet.
    #[must_use]
    pub const fn new(building: RawBuilding, metrics: BuildingMetrics) -> Self {
        Self {
            building,
            metrics,
            nearby_addresses: Vec::new(),
            linked_company: None,
        }
    }

    /// Provider id of the underlying building.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.building.id
    }
}
