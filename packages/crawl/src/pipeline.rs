//! One bounding box from map data to linked, classified companies.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::{StreamExt as _, TryStreamExt as _, stream};
use livestock_map_address::{AddressFilter, NearbyAddresses, merge_duplicates, resolve};
use livestock_map_building_models::{
    Address, AddressKey, BoundingBox, BuildingRecord, CompanyRecord,
};
use livestock_map_database::Repository;
use livestock_map_geometry::{centroid, compute_metrics};
use livestock_map_livestock::classify_entry;
use livestock_map_osm::{MapDataProvider, fetch_buildings_batched};
use livestock_map_registry::RegistryGateway;

use crate::{CrawlConfig, PipelineError, linking};

/// Counts reported for a processed bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileSummary {
    /// Buildings larger than the minimum area.
    pub building_count: u64,
    /// Companies stored from registry results.
    pub company_count: u64,
}

/// One registry query, shared by every address id with the same street
/// address.
#[derive(Debug)]
struct LookupTarget {
    text: String,
    address_ids: Vec<i64>,
}

/// Runs the building, address, registry and linking steps for one area.
pub struct BuildingPipeline {
    provider: Arc<dyn MapDataProvider>,
    gateway: Arc<RegistryGateway>,
    repo: Arc<dyn Repository>,
    filter: AddressFilter,
    config: CrawlConfig,
}

impl std::fmt::Debug for BuildingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildingPipeline")
            .field("gateway", &self.gateway)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BuildingPipeline {
    #[must_use]
    pub fn new(
        provider: Arc<dyn MapDataProvider>,
        gateway: Arc<RegistryGateway>,
        repo: Arc<dyn Repository>,
        config: CrawlConfig,
    ) -> Self {
        Self {
            provider,
            gateway,
            repo,
            filter: config.address_filter(),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Finds the large buildings in `bbox`, stores them with their nearby
    /// addresses, looks the addresses up in the registry and links each
    /// building to a livestock company.
    ///
    /// Buildings and addresses are stored before the registry is queried,
    /// so a registry failure leaves them in place for the next attempt.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the map provider, the registry or the
    /// store fails.
    pub async fn create_for_bbox(&self, bbox: &BoundingBox) -> Result<TileSummary, PipelineError> {
        let mut buildings = self.large_buildings(bbox).await?;
        let found = self.resolve_addresses(&mut buildings).await?;

        let found_count = found.len();
        let addresses = merge_duplicates(found);
        log::info!(
            "{} duplicate addresses removed",
            found_count - addresses.len()
        );

        for address in &addresses {
            self.repo.upsert_address(address)?;
        }
        for building in &buildings {
            self.repo.upsert_building(building)?;
        }

        let targets = self.lookup_targets(addresses);
        let company_count = self.store_companies(&targets).await?;

        let surviving = targets
            .iter()
            .flat_map(|target| target.address_ids.iter().copied())
            .collect::<BTreeSet<_>>();
        let linked = linking::link_buildings(self.repo.as_ref(), &mut buildings, &surviving)?;
        for key in &linked {
            linking::recount_animals(self.repo.as_ref(), key)?;
        }
        log::info!(
            "{} buildings linked to {} livestock companies",
            buildings
                .iter()
                .filter(|b| b.linked_company.is_some())
                .count(),
            linked.len()
        );

        Ok(TileSummary {
            building_count: buildings.len() as u64,
            company_count,
        })
    }

    async fn large_buildings(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<BuildingRecord>, PipelineError> {
        let exclude = self
            .config
            .excluded_building_types
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();

        let raw = fetch_buildings_batched(
            self.provider.as_ref(),
            bbox,
            &exclude,
            self.config.sub_tile_delta_lat,
            self.config.sub_tile_delta_lon,
        )
        .await?;
        log::info!("{} buildings found", raw.len());

        // Buildings crossing a sub-tile seam come back once per sub-tile.
        let mut seen = BTreeSet::new();
        let min_area = self.config.min_area_square_meters;
        let large = raw
            .into_iter()
            .filter(|building| seen.insert(building.id))
            .filter_map(|building| {
                let metrics = compute_metrics(&building.geometry);
                if metrics.area_square_meters > min_area {
                    Some(BuildingRecord::new(building, metrics))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();
        log::info!("{} buildings selected as large enough", large.len());

        Ok(large)
    }

    /// Fills in each building's nearby addresses and returns all of them,
    /// duplicates included.
    async fn resolve_addresses(
        &self,
        buildings: &mut [BuildingRecord],
    ) -> Result<Vec<Address>, PipelineError> {
        let resolver = self.config.resolver();
        let provider = self.provider.as_ref();

        let found = stream::iter(buildings.iter().map(|building| async move {
            let Some(center) = centroid(&building.building.geometry) else {
                log::warn!("Building {} has no usable centroid", building.id());
                return Ok(NearbyAddresses::default());
            };
            resolve(provider, center, &resolver).await
        }))
        .buffered(self.config.address_concurrency.max(1))
        .try_collect::<Vec<_>>()
        .await?;

        let mut addresses = Vec::new();
        for (building, nearby) in buildings.iter_mut().zip(found) {
            building.nearby_addresses = nearby
                .addresses
                .iter()
                .map(|address| address.external_id)
                .collect();
            addresses.extend(nearby.addresses);
        }
        log::info!("{} addresses found", addresses.len());

        Ok(addresses)
    }

    fn lookup_targets(&self, mut addresses: Vec<Address>) -> Vec<LookupTarget> {
        let removed = self.filter.remove_large_cities(&mut addresses);
        log::info!("{removed} addresses removed in large cities");
        let removed = self.filter.remove_populated(&mut addresses);
        log::info!("{removed} addresses removed in populated areas");

        let mut index: BTreeMap<AddressKey, usize> = BTreeMap::new();
        let mut targets: Vec<LookupTarget> = Vec::new();

        for address in addresses {
            match index.entry(address.key()) {
                Entry::Occupied(entry) => {
                    targets[*entry.get()].address_ids.push(address.external_id);
                }
                Entry::Vacant(entry) => {
                    entry.insert(targets.len());
                    targets.push(LookupTarget {
                        text: address.lookup_text(),
                        address_ids: vec![address.external_id],
                    });
                }
            }
        }

        targets
    }

    async fn store_companies(&self, targets: &[LookupTarget]) -> Result<u64, PipelineError> {
        let texts = targets
            .iter()
            .map(|target| target.text.clone())
            .collect::<Vec<_>>();
        let results = self.gateway.lookup_all(&texts).await?;

        let mut stored = 0;
        for (target, entries) in targets.iter().zip(results) {
            for entry in &entries {
                let company = classify_entry(entry);

                for &address_id in &target.address_ids {
                    let mut record = CompanyRecord {
                        address_id,
                        company: company.clone(),
                    };
                    // Keep the estimate from buildings linked in earlier tiles.
                    if let Some(existing) = self.repo.company(&record.key())? {
                        record.company.animal_count = existing.company.animal_count;
                    }
                    self.repo.upsert_company(&record)?;
                    stored += 1;
                }
            }
        }
        log::info!("{stored} companies found");

        Ok(stored)
    }
}
