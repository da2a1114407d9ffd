//! Bulk operations on stored data.
//!
//! These re-derive stored values after the rules that produced them
//! change, or clear data for a fresh crawl. None of them talk to the map
//! provider or the registry.

use std::collections::BTreeSet;

use livestock_map_address::AddressFilter;
use livestock_map_database::{DbError, Repository};
use livestock_map_geometry::{centroid, haversine_meters};
use livestock_map_livestock::classify;

use crate::linking::{link_buildings, recount_animals};

/// Result of [`relink_buildings`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelinkSummary {
    /// Buildings examined.
    pub buildings: usize,
    /// Buildings now linked to a company.
    pub linked_buildings: usize,
    /// Companies with at least one linked building.
    pub linked_companies: usize,
}

/// Result of [`cleanup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Buildings whose nearby address list changed.
    pub buildings_trimmed: usize,
    /// Companies deleted for having no description.
    pub companies_deleted: u64,
}

/// Moves every failed tile back to pending.
///
/// # Errors
///
/// Returns [`DbError`] if the store fails.
pub fn requeue_failed_tiles(repo: &dyn Repository) -> Result<u64, DbError> {
    let count = repo.requeue_failed()?;
    log::info!("{count} failed tiles re-queued");
    Ok(count)
}

/// # Errors
///
/// Returns [`DbError`] if the store fails.
pub fn delete_tiles(repo: &dyn Repository) -> Result<u64, DbError> {
    let count = repo.delete_all_tiles()?;
    log::info!("{count} tiles deleted");
    Ok(count)
}

/// # Errors
///
/// Returns [`DbError`] if the store fails.
pub fn delete_buildings(repo: &dyn Repository) -> Result<u64, DbError> {
    let count = repo.delete_all_buildings()?;
    log::info!("{count} buildings deleted");
    Ok(count)
}

/// Re-runs the livestock classifier over every stored description.
/// Companies whose species changed get their animal estimate recomputed.
/// Returns the number of companies that changed.
///
/// # Errors
///
/// Returns [`DbError`] if the store fails.
pub fn reclassify_companies(repo: &dyn Repository) -> Result<u64, DbError> {
    let mut changed = 0;

    for mut record in repo.companies()? {
        let flags = classify(&record.company.description);
        if flags == record.company.flags {
            continue;
        }

        log::debug!(
            "Company '{}' reclassified from {} to {}",
            record.company.description,
            record.company.main_animal_type(),
            flags.main_animal_type()
        );
        record.company.flags = flags;
        repo.upsert_company(&record)?;
        recount_animals(repo, &record.key())?;
        changed += 1;
    }

    log::info!("{changed} companies reclassified");
    Ok(changed)
}

/// Re-links every stored building to a company and recomputes every
/// company's animal estimate.
///
/// Stored addresses are filtered again with `filter`; addresses it rejects,
/// and ids with no stored address, are not linked.
///
/// # Errors
///
/// Returns [`DbError`] if the store fails.
pub fn relink_buildings(
    repo: &dyn Repository,
    filter: &AddressFilter,
) -> Result<RelinkSummary, DbError> {
    let mut buildings = repo.buildings()?;

    let referenced = buildings
        .iter()
        .flat_map(|building| building.nearby_addresses.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    let surviving = repo
        .addresses(&referenced)?
        .iter()
        .filter(|address| filter.accepts(address))
        .map(|address| address.external_id)
        .collect::<BTreeSet<_>>();
    log::info!(
        "{} of {} nearby addresses pass the address filter",
        surviving.len(),
        referenced.len()
    );

    let linked = link_buildings(repo, &mut buildings, &surviving)?;

    for record in repo.companies()? {
        recount_animals(repo, &record.key())?;
    }

    let summary = RelinkSummary {
        buildings: buildings.len(),
        linked_buildings: buildings
            .iter()
            .filter(|building| building.linked_company.is_some())
            .count(),
        linked_companies: linked.len(),
    };
    log::info!(
        "{} of {} buildings linked to {} companies",
        summary.linked_buildings,
        summary.buildings,
        summary.linked_companies
    );
    Ok(summary)
}

/// Trims every building's nearby addresses to the `max_addresses` closest
/// to its centroid, then deletes companies without a description.
///
/// Address ids that no longer resolve to a stored address are dropped.
///
/// # Errors
///
/// Returns [`DbError`] if the store fails.
pub fn cleanup(repo: &dyn Repository, max_addresses: usize) -> Result<CleanupSummary, DbError> {
    let mut buildings_trimmed = 0;

    for mut building in repo.buildings()? {
        let Some(center) = centroid(&building.building.geometry) else {
            continue;
        };

        let mut nearby = repo
            .addresses(&building.nearby_addresses)?
            .into_iter()
            .map(|address| (haversine_meters(center, address.location()), address.external_id))
            .collect::<Vec<_>>();
        nearby.sort_by(|(a_dist, a_id), (b_dist, b_id)| {
            a_dist.total_cmp(b_dist).then_with(|| a_id.cmp(b_id))
        });
        nearby.dedup_by_key(|(_, id)| *id);

        let trimmed = nearby
            .into_iter()
            .take(max_addresses)
            .map(|(_, id)| id)
            .collect::<Vec<_>>();

        if trimmed != building.nearby_addresses {
            building.nearby_addresses = trimmed;
            repo.upsert_building(&building)?;
            buildings_trimmed += 1;
        }
    }

    let companies_deleted = repo.delete_companies_without_description()?;
    log::info!(
        "{buildings_trimmed} buildings trimmed, {companies_deleted} companies without description deleted"
    );

    Ok(CleanupSummary {
        buildings_trimmed,
        companies_deleted,
    })
}
