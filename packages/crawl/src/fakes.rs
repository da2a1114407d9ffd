//! Hand-written collaborators for crawl tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use livestock_map_building_models::{
    AddressNode, BoundingBox, BuildingMetrics, BuildingRecord, CompanyRecord, LatLon,
    RawBuilding, RegistryEntry,
};
use livestock_map_database::Repository;
use livestock_map_livestock::classify_entry;
use livestock_map_osm::{MapDataProvider, OsmError};
use livestock_map_registry::{RegistryError, RegistryGateway, RegistryLookup, RegistryPolicy};
use livestock_map_schedule::{Cancelled, RecordingSleeper, Shutdown, Sleeper};

use crate::{BuildingPipeline, CrawlConfig};

pub const REFERENCE_ADDRESS: &str = "Postweg 227 Lunteren";

/// Shared, ordered record of what the fakes were asked to do.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn square(lat: f64, lon: f64, d_lat: f64, d_lon: f64) -> Vec<LatLon> {
    vec![
        LatLon::new(lat, lon),
        LatLon::new(lat, lon + d_lon),
        LatLon::new(lat + d_lat, lon + d_lon),
        LatLon::new(lat + d_lat, lon),
        LatLon::new(lat, lon),
    ]
}

#[allow(clippy::cast_possible_truncation)]
fn hundredths(value: f64) -> i64 {
    (value * 100.0).floor() as i64
}

/// Returns one barn of about 3000 m² and one small shed per building query,
/// and `nodes_per_query` addresses per address query, nearest first.
///
/// Ids and house numbers are derived from the queried longitude so that
/// different tiles produce different buildings and addresses.
#[derive(Debug)]
pub struct FakeProvider {
    pub city: String,
    pub nodes_per_query: usize,
    pub fail_buildings: bool,
    /// Building queries at these western edges fail.
    pub failing_lon_min: Vec<f64>,
    pub events: EventLog,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            city: "Lunteren".to_string(),
            nodes_per_query: 1,
            fail_buildings: false,
            failing_lon_min: Vec::new(),
            events: EventLog::default(),
        }
    }
}

#[async_trait]
impl MapDataProvider for FakeProvider {
    async fn fetch_buildings(
        &self,
        bbox: &BoundingBox,
        _exclude_types: &[&str],
    ) -> Result<Vec<RawBuilding>, OsmError> {
        self.events.push(format!("buildings {}", bbox.lon_min()));

        let fails = self
            .failing_lon_min
            .iter()
            .any(|lon| (lon - bbox.lon_min()).abs() < 1e-9);
        if self.fail_buildings || fails {
            return Err(OsmError::Decode {
                message: "runtime error: Query timed out".to_string(),
            });
        }

        let base = hundredths(bbox.lon_min() + 0.000_5);
        let lat = bbox.lat_min() + 0.000_2;
        let lon = bbox.lon_min() + 0.000_2;

        Ok(vec![
            RawBuilding {
                id: base * 10 + 1,
                tags: tags(&[("building", "farm_auxiliary")]),
                geometry: square(lat, lon, 0.000_5, 0.000_8),
            },
            RawBuilding {
                id: base * 10 + 2,
                tags: tags(&[("building", "shed")]),
                geometry: square(lat + 0.002, lon, 0.000_05, 0.000_05),
            },
        ])
    }

    async fn fetch_addresses_near(
        &self,
        lat: f64,
        lon: f64,
        _radius_meters: f64,
    ) -> Result<Vec<AddressNode>, OsmError> {
        let base = hundredths(lon) * 100;

        Ok((0..self.nodes_per_query)
            .map(|i| {
                let number = base + i64::try_from(i).unwrap();
                AddressNode {
                    id: number,
                    lat: lat + 0.000_1 * f64::from(u32::try_from(i + 1).unwrap()),
                    lon,
                    tags: tags(&[
                        ("addr:street", "Postweg"),
                        ("addr:housenumber", number.to_string().as_str()),
                        ("addr:city", self.city.as_str()),
                    ]),
                }
            })
            .collect())
    }
}

/// Answers the reference address with three entries (after an optional
/// number of bad answers) and every other address with one pig farm.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    bad_health_checks: AtomicUsize,
    calls: Mutex<Vec<String>>,
    pub events: EventLog,
}

impl FakeRegistry {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_health_checks(count: usize) -> Arc<Self> {
        Arc::new(Self {
            bad_health_checks: AtomicUsize::new(count),
            ..Self::default()
        })
    }

    pub fn with_events(events: EventLog, bad_health_checks: usize) -> Arc<Self> {
        Arc::new(Self {
            bad_health_checks: AtomicUsize::new(bad_health_checks),
            calls: Mutex::new(Vec::new()),
            events,
        })
    }

    /// Non-reference addresses looked up so far.
    pub fn address_lookups(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|address| *address != REFERENCE_ADDRESS)
            .cloned()
            .collect()
    }
}

fn entry(description: &str, active: bool) -> RegistryEntry {
    RegistryEntry {
        description: description.to_string(),
        active,
    }
}

#[async_trait]
impl RegistryLookup for FakeRegistry {
    async fn lookup(&self, address: &str) -> Result<Vec<RegistryEntry>, RegistryError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(address.to_string());

        if address == REFERENCE_ADDRESS {
            let bad = self
                .bad_health_checks
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            self.events.push(if bad { "health bad" } else { "health ok" });
            if bad {
                return Ok(Vec::new());
            }
            return Ok(vec![
                entry("Melkveehouderij", true),
                entry("Akkerbouw", true),
                entry("Loonwerk", false),
            ]);
        }

        self.events.push(format!("registry {address}"));
        Ok(vec![entry("Varkenshouderij", true)])
    }
}

/// Records every requested sleep in an [`EventLog`] without waiting.
#[derive(Debug)]
pub struct EventSleeper {
    pub events: EventLog,
    pub shutdown: Shutdown,
}

#[async_trait]
impl Sleeper for EventSleeper {
    async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        if self.shutdown.is_triggered() {
            return Err(Cancelled);
        }
        self.events.push(format!("sleep {}", duration.as_secs()));
        Ok(())
    }
}

/// A pipeline whose registry pacing never waits.
pub fn test_pipeline(
    provider: Arc<dyn MapDataProvider>,
    registry: Arc<FakeRegistry>,
    repo: Arc<dyn Repository>,
    config: CrawlConfig,
) -> BuildingPipeline {
    let gateway = RegistryGateway::new(
        registry,
        Arc::new(RecordingSleeper::default()),
        RegistryPolicy::default(),
    );
    BuildingPipeline::new(provider, Arc::new(gateway), repo, config)
}

pub fn company_record(address_id: i64, description: &str, active: bool) -> CompanyRecord {
    CompanyRecord {
        address_id,
        company: classify_entry(&entry(description, active)),
    }
}

pub fn building_record(id: i64, area: f64, nearby_addresses: Vec<i64>) -> BuildingRecord {
    BuildingRecord {
        building: RawBuilding {
            id,
            tags: tags(&[("building", "farm_auxiliary")]),
            geometry: square(52.0, 5.0, 0.000_5, 0.000_8),
        },
        metrics: BuildingMetrics {
            area_square_meters: area,
            length_meters: 60.0,
            width_meters: area / 60.0,
        },
        nearby_addresses,
        linked_company: None,
    }
}
