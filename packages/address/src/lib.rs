#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Nearest-address resolution.
//!
//! For each building centroid the map provider is asked for address nodes
//! close by. Unusable nodes are dropped, duplicates of the same physical
//! address collapsed, and the closest few kept. The raw number of nodes the
//! provider returned is kept on every address as a local density signal,
//! which [`AddressFilter`] later uses to discard addresses in built-up
//! areas.

pub mod cities;
pub mod filter;

use std::collections::BTreeSet;

use livestock_map_building_models::{Address, AddressNode, LatLon};
use livestock_map_geometry::haversine_meters;
use livestock_map_osm::{MapDataProvider, OsmError};
use serde::Deserialize;

pub use cities::LARGE_CITIES_NL;
pub use filter::{AddressFilter, merge_duplicates};

/// Search radii and result size for [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// First search radius.
    pub radius_meters: f64,
    /// Radius of the single retry when the first search is empty.
    pub retry_radius_meters: f64,
    /// Maximum number of addresses kept per building.
    pub max_addresses: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            radius_meters: 100.0,
            retry_radius_meters: 200.0,
            max_addresses: 5,
        }
    }
}

/// Addresses near one point, closest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearbyAddresses {
    /// Number of nodes the provider returned, before any filtering.
    pub raw_count: usize,
    /// At most `limit` distinct addresses, sorted by ascending distance.
    pub addresses: Vec<Address>,
}

/// Picks the `limit` closest distinct addresses among `nodes`.
///
/// Nodes without both a street and a house number are dropped. Nodes that
/// describe the same (street, house number, city) collapse to the closest
/// one. Every returned address carries `nodes.len()` as its
/// `nearby_address_count`.
#[must_use]
pub fn select_nearest(centroid: LatLon, nodes: &[AddressNode], limit: usize) -> NearbyAddresses {
    let raw_count = nodes.len();
    let density = u32::try_from(raw_count).unwrap_or(u32::MAX);

    let mut candidates = nodes
        .iter()
        .filter_map(|node| {
            let address = Address::from_node(node);
            if address.is_none() {
                log::debug!("Dropping address node {} without street or house number", node.id);
            }
            address
        })
        .map(|address| (haversine_meters(centroid, address.location()), address))
        .collect::<Vec<_>>();

    candidates.sort_by(|(a_dist, a), (b_dist, b)| {
        a_dist
            .total_cmp(b_dist)
            .then_with(|| a.external_id.cmp(&b.external_id))
    });

    let mut seen = BTreeSet::new();
    let addresses = candidates
        .into_iter()
        .filter(|(_, address)| seen.insert(address.key()))
        .take(limit)
        .map(|(_, mut address)| {
            address.nearby_address_count = Some(density);
            address
        })
        .collect();

    NearbyAddresses {
        raw_count,
        addresses,
    }
}

/// Queries `provider` around `centroid` and selects the nearest addresses.
///
/// Searches [`ResolverConfig::radius_meters`] first and, only if the
/// provider returns nothing there, once more at
/// [`ResolverConfig::retry_radius_meters`].
///
/// # Errors
///
/// Returns [`OsmError`] if a provider query fails.
pub async fn resolve(
    provider: &dyn MapDataProvider,
    centroid: LatLon,
    config: &ResolverConfig,
) -> Result<NearbyAddresses, OsmError> {
    let mut nodes = provider
        .fetch_addresses_near(centroid.lat, centroid.lon, config.radius_meters)
        .await?;

    if nodes.is_empty() {
        log::debug!(
            "No addresses within {} m of {}, {}; retrying at {} m",
            config.radius_meters,
            centroid.lat,
            centroid.lon,
            config.retry_radius_meters,
        );
        nodes = provider
            .fetch_addresses_near(centroid.lat, centroid.lon, config.retry_radius_meters)
            .await?;
    }

    Ok(select_nearest(centroid, &nodes, config.max_addresses))
}
