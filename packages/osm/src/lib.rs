#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map data provider.
//!
//! [`MapDataProvider`] is the seam between the crawl and the source of
//! building polygons and address nodes. [`overpass::OverpassClient`] is the
//! production implementation; tests substitute in-memory fakes.

pub mod overpass;
pub mod response;

use async_trait::async_trait;
use livestock_map_building_models::{AddressNode, BoundingBox, RawBuilding};
use livestock_map_http::HttpError;
use livestock_map_tiles::{TileError, sub_tiles};

pub use overpass::{OverpassClient, OverpassConfig};

/// Building types that are never agricultural and are excluded at the
/// source.
pub const DEFAULT_EXCLUDED_BUILDING_TYPES: &[&str] = &[
    "apartments",
    "barracks",
    "castle",
    "commercial",
    "college",
    "church",
    "industrial",
    "garage",
    "garages",
    "government",
    "greenhouse",
    "hangar",
    "house",
    "hotel",
    "office",
    "parking",
    "public",
    "religious",
    "residental",
    "retail",
    "school",
    "sports_hall",
    "sports_centre",
    "stadium",
    "supermarket",
    "university",
    "train_station",
    "transportation",
    "warehouse",
];

/// Errors from a map data provider.
#[derive(Debug, thiserror::Error)]
pub enum OsmError {
    /// The request failed after retries.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The response as a whole could not be decoded.
    #[error("Unusable map data response: {message}")]
    Decode {
        /// What was wrong with the response.
        message: String,
    },

    /// The query area could not be sub-tiled.
    #[error(transparent)]
    Tile(#[from] TileError),
}

/// Source of building polygons and address nodes.
#[async_trait]
pub trait MapDataProvider: Send + Sync {
    /// Returns every building way inside `bbox` whose `building` tag is not
    /// in `exclude_types`.
    ///
    /// # Errors
    ///
    /// Returns [`OsmError`] if the query fails or the response is unusable.
    async fn fetch_buildings(
        &self,
        bbox: &BoundingBox,
        exclude_types: &[&str],
    ) -> Result<Vec<RawBuilding>, OsmError>;

    /// Returns every node carrying a house number within `radius_meters` of
    /// (`lat`, `lon`).
    ///
    /// # Errors
    ///
    /// Returns [`OsmError`] if the query fails or the response is unusable.
    async fn fetch_addresses_near(
        &self,
        lat: f64,
        lon: f64,
        radius_meters: f64,
    ) -> Result<Vec<AddressNode>, OsmError>;
}

/// Fetches buildings for an area too large for a single provider query by
/// querying each sub-tile in turn.
///
/// Buildings crossing a sub-tile seam are returned once per overlapping
/// sub-tile; callers upsert by building id.
///
/// # Errors
///
/// Returns [`OsmError`] if the deltas are invalid or any sub-tile query
/// fails.
pub async fn fetch_buildings_batched(
    provider: &dyn MapDataProvider,
    bbox: &BoundingBox,
    exclude_types: &[&str],
    delta_lat: f64,
    delta_lon: f64,
) -> Result<Vec<RawBuilding>, OsmError> {
    let tiles = sub_tiles(bbox, delta_lat, delta_lon)?;
    log::info!("{} tiles created", tiles.len());

    let mut buildings = Vec::new();
    for (i, tile) in tiles.iter().enumerate() {
        log::info!("getting tile: {}/{}", i + 1, tiles.len());
        buildings.extend(provider.fetch_buildings(tile, exclude_types).await?);
    }

    Ok(buildings)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use livestock_map_building_models::LatLon;

    use super::*;

    /// Returns one building per query, with the building id counting up.
    #[derive(Default)]
    struct CountingProvider {
        queries: Mutex<Vec<BoundingBox>>,
    }

    #[async_trait]
    impl MapDataProvider for CountingProvider {
        async fn fetch_buildings(
            &self,
            bbox: &BoundingBox,
            _exclude_types: &[&str],
        ) -> Result<Vec<RawBuilding>, OsmError> {
            let mut queries = self.queries.lock().unwrap();
            queries.push(*bbox);
            Ok(vec![RawBuilding {
                id: i64::try_from(queries.len()).unwrap(),
                tags: BTreeMap::new(),
                geometry: vec![LatLon::new(bbox.lat_min(), bbox.lon_min())],
            }])
        }

        async fn fetch_addresses_near(
            &self,
            _lat: f64,
            _lon: f64,
            _radius_meters: f64,
        ) -> Result<Vec<AddressNode>, OsmError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn batched_fetch_queries_every_sub_tile() {
        let provider = CountingProvider::default();
        let bbox = BoundingBox::new(5.0, 5.15, 52.0, 52.1).unwrap();

        let buildings = fetch_buildings_batched(&provider, &bbox, &[], 0.07, 0.07)
            .await
            .unwrap();

        assert_eq!(buildings.len(), 6);
        let queries = provider.queries.lock().unwrap();
        assert_eq!(queries.len(), 6);
        assert!((queries[0].lon_min() - 5.0).abs() < f64::EPSILON);
        assert!((queries[5].lon_max() - 5.15).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn batched_fetch_rejects_invalid_delta() {
        let provider = CountingProvider::default();
        let bbox = BoundingBox::new(5.0, 5.15, 52.0, 52.1).unwrap();

        let result = fetch_buildings_batched(&provider, &bbox, &[], 0.0, 0.07).await;
        assert!(matches!(result, Err(OsmError::Tile(_))));
    }

    #[test]
    fn default_exclusions_cover_houses_but_not_farms() {
        assert!(DEFAULT_EXCLUDED_BUILDING_TYPES.contains(&"house"));
        assert!(DEFAULT_EXCLUDED_BUILDING_TYPES.contains(&"warehouse"));
        assert!(!DEFAULT_EXCLUDED_BUILDING_TYPES.contains(&"farm_auxiliary"));
        assert!(!DEFAULT_EXCLUDED_BUILDING_TYPES.contains(&"barn"));
    }
}
