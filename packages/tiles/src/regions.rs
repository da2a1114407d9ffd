//! Named regions and the country extent, embedded from `regions.toml`.

use livestock_map_building_models::{BoundingBox, InvalidBoundingBox};
use serde::Deserialize;

const REGIONS_TOML: &str = include_str!("../regions.toml");

/// A named rectangular area that can be crawled on demand.
#[derive(Debug, Clone, Deserialize)]
pub struct Region {
    /// Identifier used on the command line (e.g. `"lunteren"`).
    pub id: String,
    /// Human-readable name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    /// Southern edge.
    pub lat_min: f64,
    /// Western edge.
    pub lon_min: f64,
    /// Northern edge.
    pub lat_max: f64,
    /// Eastern edge.
    pub lon_max: f64,
}

impl Region {
    /// The region's bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoundingBox`] if the configured corners are inverted.
    pub fn bbox(&self) -> Result<BoundingBox, InvalidBoundingBox> {
        BoundingBox::new(self.lon_min, self.lon_max, self.lat_min, self.lat_max)
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// The country covered by the tile crawl.
#[derive(Debug, Clone, Deserialize)]
pub struct Country {
    /// The country extent.
    #[serde(flatten)]
    pub region: Region,
    /// Default number of crawl tiles.
    pub tile_count: u32,
}

#[derive(Debug, Deserialize)]
struct RegionsFile {
    country: Country,
    regions: Vec<Region>,
}

fn load() -> RegionsFile {
    toml::de::from_str(REGIONS_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse embedded regions.toml: {e}"))
}

/// Returns all named regions.
///
/// # Panics
///
/// Panics if the embedded `regions.toml` is malformed (a build-time
/// guarantee since the file is compiled in).
#[must_use]
pub fn all_regions() -> Vec<Region> {
    load().regions
}

/// Looks up a region by id (case-insensitive).
#[must_use]
pub fn find_region(id: &str) -> Option<Region> {
    all_regions()
        .into_iter()
        .find(|r| r.id.eq_ignore_ascii_case(id))
}

/// Returns the crawled country extent.
///
/// # Panics
///
/// Panics if the embedded `regions.toml` is malformed.
#[must_use]
pub fn country() -> Country {
    load().country
}
