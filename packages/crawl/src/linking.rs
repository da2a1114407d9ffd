//! Attribution of buildings to companies.
//!
//! A building is attributed to the first active livestock company found
//! while walking its nearby addresses nearest first. There is no tie-break
//! between several qualifying companies at the same address: the one
//! stored first wins.
//!
//! Only addresses that survived the city and density filters take part, so
//! a company stored at an address that has since been filtered out does
//! not receive buildings.

use std::collections::BTreeSet;

use livestock_map_building_models::{BuildingRecord, CompanyKey};
use livestock_map_database::{DbError, Repository};
use livestock_map_livestock::estimate_animal_count;

/// Finds the company a building with these nearby addresses belongs to.
///
/// # Errors
///
/// Returns [`DbError`] if companies cannot be read.
pub fn first_livestock_company(
    repo: &dyn Repository,
    nearby_addresses: &[i64],
) -> Result<Option<CompanyKey>, DbError> {
    for &address_id in nearby_addresses {
        if let Some(record) = repo
            .companies_at(address_id)?
            .into_iter()
            .find(|record| record.company.is_active_livestock())
        {
            return Ok(Some(record.key()));
        }
    }
    Ok(None)
}

/// Re-links every building and stores it, returning the companies that
/// received at least one building. Nearby addresses outside `surviving`
/// are skipped.
///
/// # Errors
///
/// Returns [`DbError`] if the store fails.
pub fn link_buildings(
    repo: &dyn Repository,
    buildings: &mut [BuildingRecord],
    surviving: &BTreeSet<i64>,
) -> Result<BTreeSet<CompanyKey>, DbError> {
    let mut linked = BTreeSet::new();

    for building in buildings {
        let candidates = building
            .nearby_addresses
            .iter()
            .copied()
            .filter(|id| surviving.contains(id))
            .collect::<Vec<_>>();
        building.linked_company = first_livestock_company(repo, &candidates)?;
        repo.upsert_building(building)?;

        if let Some(key) = &building.linked_company {
            linked.insert(key.clone());
        }
    }

    Ok(linked)
}

/// Recomputes a company's animal estimate from every building linked to
/// it. Returns the new count, or `None` if the company does not exist.
///
/// # Errors
///
/// Returns [`DbError`] if the store fails.
pub fn recount_animals(repo: &dyn Repository, key: &CompanyKey) -> Result<Option<f64>, DbError> {
    let Some(mut record) = repo.company(key)? else {
        log::warn!(
            "Company '{}' at address {} no longer exists",
            key.description,
            key.address_id
        );
        return Ok(None);
    };

    let areas = repo
        .buildings_linked_to(key)?
        .iter()
        .map(|building| building.metrics.area_square_meters)
        .collect::<Vec<_>>();

    record.company.animal_count =
        estimate_animal_count(areas, record.company.main_animal_type());
    repo.upsert_company(&record)?;

    Ok(Some(record.company.animal_count))
}
