//! Overpass API client.

use std::time::Duration;

use async_trait::async_trait;
use livestock_map_building_models::{AddressNode, BoundingBox, RawBuilding};
use livestock_map_http::{HttpError, RetryPolicy, build_client, retry};
use serde::Deserialize;

use crate::{MapDataProvider, OsmError, response};

/// Public Overpass instance.
pub const DEFAULT_BASE_URL: &str = "https://overpass-api.de/api";

/// Connection settings for [`OverpassClient`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OverpassConfig {
    /// API root; `/interpreter`, `/status` and `/kill_my_queries` are
    /// appended.
    pub base_url: String,
    /// Server-side query timeout, also used as the client request timeout.
    pub timeout_secs: u64,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

/// [`MapDataProvider`] backed by an Overpass API instance.
#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: reqwest::Client,
    config: OverpassConfig,
    retry: RetryPolicy,
}

impl OverpassClient {
    /// Creates a client for the configured instance.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] if the HTTP client cannot be built.
    pub fn new(config: OverpassConfig) -> Result<Self, HttpError> {
        // Leave headroom over the server-side timeout for the response body.
        let client = build_client(Duration::from_secs(config.timeout_secs + 30))?;
        Ok(Self {
            client,
            config,
            retry: RetryPolicy::default(),
        })
    }

    /// Overrides the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn interpret(&self, query: &str) -> Result<response::OverpassResponse, OsmError> {
        let url = self.url("interpreter");
        let body = retry::send_text(&self.retry, || {
            self.client.post(&url).form(&[("data", query)])
        })
        .await?;
        response::parse(&body)
    }

    /// Fetches the instance's status page (rate-limit slots and running
    /// queries for this client).
    ///
    /// # Errors
    ///
    /// Returns [`OsmError::Http`] if the request fails.
    pub async fn status(&self) -> Result<String, OsmError> {
        let url = self.url("status");
        Ok(retry::send_text(&self.retry, || self.client.get(&url)).await?)
    }

    /// Aborts every query this client still has running on the instance.
    ///
    /// # Errors
    ///
    /// Returns [`OsmError::Http`] if the request fails.
    pub async fn kill_my_queries(&self) -> Result<String, OsmError> {
        let url = self.url("kill_my_queries");
        Ok(retry::send_text(&RetryPolicy::none(), || self.client.get(&url)).await?)
    }
}

/// Overpass QL for building ways inside `bbox`, excluding `exclude_types`,
/// with inline geometry.
#[must_use]
pub fn buildings_query(bbox: &BoundingBox, exclude_types: &[&str], timeout_secs: u64) -> String {
    let filter = if exclude_types.is_empty() {
        String::new()
    } else {
        format!("[\"building\"!~\"^({})$\"]", exclude_types.join("|"))
    };
    format!(
        "[out:json][timeout:{timeout_secs}];(way[building]{filter}({},{},{},{}););out geom;",
        bbox.lat_min(),
        bbox.lon_min(),
        bbox.lat_max(),
        bbox.lon_max(),
    )
}

/// Overpass QL for nodes with a house number within `radius_meters` of a
/// point.
#[must_use]
pub fn addresses_query(lat: f64, lon: f64, radius_meters: f64, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{timeout_secs}];\
         (node[\"addr:housenumber\"](around:{radius_meters},{lat},{lon}););out body;"
    )
}

#[async_trait]
impl MapDataProvider for OverpassClient {
    async fn fetch_buildings(
        &self,
        bbox: &BoundingBox,
        exclude_types: &[&str],
    ) -> Result<Vec<RawBuilding>, OsmError> {
        log::info!("get buildings for {bbox}");
        let query = buildings_query(bbox, exclude_types, self.config.timeout_secs);
        Ok(self.interpret(&query).await?.into_buildings())
    }

    async fn fetch_addresses_near(
        &self,
        lat: f64,
        lon: f64,
        radius_meters: f64,
    ) -> Result<Vec<AddressNode>, OsmError> {
        log::debug!(
            "get nearby addresses for {lat}, {lon} within a distance of {radius_meters} m"
        );
        let query = addresses_query(lat, lon, radius_meters, self.config.timeout_secs);
        Ok(self.interpret(&query).await?.into_address_nodes())
    }
}
