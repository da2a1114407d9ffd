//! Crawl settings, read from an optional TOML file.

use std::path::Path;
use std::time::Duration;

use livestock_map_address::{AddressFilter, LARGE_CITIES_NL, ResolverConfig};
use livestock_map_osm::{DEFAULT_EXCLUDED_BUILDING_TYPES, OverpassConfig};
use livestock_map_registry::RegistryPolicy;
use livestock_map_tiles::DEFAULT_SUB_TILE_DELTA;
use serde::Deserialize;

/// Errors loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path of the config file.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or has wrongly typed fields.
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: String,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// Every tunable of the crawl. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Buildings must be strictly larger than this to be kept.
    pub min_area_square_meters: f64,
    /// Latitude size of one map-provider building query.
    pub sub_tile_delta_lat: f64,
    /// Longitude size of one map-provider building query.
    pub sub_tile_delta_lon: f64,
    /// `building=*` values never fetched.
    pub excluded_building_types: Vec<String>,
    /// First address search radius around a building.
    pub address_radius_meters: f64,
    /// Address search radius when the first search finds nothing.
    pub address_retry_radius_meters: f64,
    /// Addresses kept per building.
    pub max_nearby_addresses: usize,
    /// Addresses with more raw candidates around them than this are
    /// considered residential and dropped.
    pub max_addresses_nearby: u32,
    /// Addresses in these cities are never looked up.
    pub excluded_cities: Vec<String>,
    /// Concurrent address queries per tile.
    pub address_concurrency: usize,
    /// Tiles crawled concurrently.
    pub tile_workers: usize,
    /// Pause after a registry malfunction before any worker claims another
    /// tile.
    pub malfunction_cooldown_secs: u64,
    /// Registry pacing and health checks.
    pub registry: RegistryPolicy,
    /// Overpass connection.
    pub overpass: OverpassConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            min_area_square_meters: 200.0,
            sub_tile_delta_lat: DEFAULT_SUB_TILE_DELTA,
            sub_tile_delta_lon: DEFAULT_SUB_TILE_DELTA,
            excluded_building_types: DEFAULT_EXCLUDED_BUILDING_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
            address_radius_meters: 100.0,
            address_retry_radius_meters: 200.0,
            max_nearby_addresses: 5,
            max_addresses_nearby: 10,
            excluded_cities: LARGE_CITIES_NL.iter().map(ToString::to_string).collect(),
            address_concurrency: 2,
            tile_workers: 1,
            malfunction_cooldown_secs: 300,
            registry: RegistryPolicy::default(),
            overpass: OverpassConfig::default(),
        }
    }
}

impl CrawlConfig {
    /// Reads a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::de::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Reads `path` if given, otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    #[must_use]
    pub const fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            radius_meters: self.address_radius_meters,
            retry_radius_meters: self.address_retry_radius_meters,
            max_addresses: self.max_nearby_addresses,
        }
    }

    #[must_use]
    pub fn address_filter(&self) -> AddressFilter {
        AddressFilter::new(
            self.excluded_cities.iter().map(String::as_str),
            self.max_addresses_nearby,
        )
    }

    #[must_use]
    pub const fn malfunction_cooldown(&self) -> Duration {
        Duration::from_secs(self.malfunction_cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: CrawlConfig = toml::de::from_str("").unwrap();
        assert_eq!(config, CrawlConfig::default());
        assert_eq!(config.registry.health_check_expected, 3);
        assert_eq!(config.malfunction_cooldown(), Duration::from_secs(300));
        assert!(config.excluded_cities.iter().any(|c| c == "Amsterdam"));
    }

    #[test]
    fn overrides_nested_sections() {
        let config: CrawlConfig = toml::de::from_str(
            r#"
            tile_workers = 4
            min_area_square_meters = 500.0
            excluded_cities = ["Ede"]

            [registry]
            delay_secs = 2.0

            [overpass]
            base_url = "http://localhost:12345/api"
            "#,
        )
        .unwrap();

        assert_eq!(config.tile_workers, 4);
        assert!((config.min_area_square_meters - 500.0).abs() < f64::EPSILON);
        assert!((config.registry.delay_secs - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.registry.long_pause_every, 250);
        assert_eq!(config.overpass.base_url, "http://localhost:12345/api");
        assert_eq!(config.overpass.timeout_secs, 60);
        assert!((config.address_radius_meters - 100.0).abs() < f64::EPSILON);

        let filter = config.address_filter();
        assert_eq!(filter.density_threshold(), 10);
    }

    #[test]
    fn resolver_settings_follow_config() {
        let config = CrawlConfig {
            max_nearby_addresses: 3,
            address_retry_radius_meters: 250.0,
            ..CrawlConfig::default()
        };
        let resolver = config.resolver();
        assert_eq!(resolver.max_addresses, 3);
        assert!((resolver.retry_radius_meters - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = CrawlConfig::load(Path::new("/nonexistent/livestock_map.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(
            CrawlConfig::load_or_default(None).unwrap(),
            CrawlConfig::default()
        );
    }
}
