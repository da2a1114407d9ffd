//! Post-resolution address filtering.

use std::collections::{BTreeMap, BTreeSet};

use livestock_map_building_models::Address;

use crate::LARGE_CITIES_NL;

/// Discards addresses that are unlikely to belong to a farm: those in
/// large cities and those surrounded by many other addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressFilter {
    excluded_cities: BTreeSet<String>,
    density_threshold: u32,
}

impl Default for AddressFilter {
    fn default() -> Self {
        Self::new(LARGE_CITIES_NL.iter().copied(), 10)
    }
}

impl AddressFilter {
    /// City names are matched case-insensitively and exactly.
    #[must_use]
    pub fn new<'a>(
        excluded_cities: impl IntoIterator<Item = &'a str>,
        density_threshold: u32,
    ) -> Self {
        Self {
            excluded_cities: excluded_cities
                .into_iter()
                .map(|city| city.trim().to_lowercase())
                .collect(),
            density_threshold,
        }
    }

    #[must_use]
    pub const fn density_threshold(&self) -> u32 {
        self.density_threshold
    }

    /// Whether the address lies in an excluded city. Addresses without a
    /// city are never excluded.
    #[must_use]
    pub fn in_excluded_city(&self, address: &Address) -> bool {
        address
            .city
            .as_deref()
            .is_some_and(|city| self.excluded_cities.contains(&city.trim().to_lowercase()))
    }

    /// Whether more addresses than the threshold were found around it.
    #[must_use]
    pub fn is_too_dense(&self, address: &Address) -> bool {
        address
            .nearby_address_count
            .is_some_and(|count| count > self.density_threshold)
    }

    /// Whether the address survives both the city and the density filter.
    #[must_use]
    pub fn accepts(&self, address: &Address) -> bool {
        !self.in_excluded_city(address) && !self.is_too_dense(address)
    }

    /// Removes addresses in excluded cities, returning how many were removed.
    pub fn remove_large_cities(&self, addresses: &mut Vec<Address>) -> usize {
        let before = addresses.len();
        addresses.retain(|address| !self.in_excluded_city(address));
        before - addresses.len()
    }

    /// Removes addresses in densely populated areas, returning how many were
    /// removed.
    pub fn remove_populated(&self, addresses: &mut Vec<Address>) -> usize {
        let before = addresses.len();
        addresses.retain(|address| !self.is_too_dense(address));
        before - addresses.len()
    }
}

/// Collapses addresses seen by several buildings into one per external id,
/// keeping the highest observed density. Order of first appearance is kept.
#[must_use]
pub fn merge_duplicates(addresses: Vec<Address>) -> Vec<Address> {
    let mut index: BTreeMap<i64, usize> = BTreeMap::new();
    let mut merged: Vec<Address> = Vec::with_capacity(addresses.len());

    for address in addresses {
        if let Some(&i) = index.get(&address.external_id) {
            let existing = &mut merged[i];
            existing.nearby_address_count = existing
                .nearby_address_count
                .max(address.nearby_address_count);
        } else {
            index.insert(address.external_id, merged.len());
            merged.push(address);
        }
    }

    merged
}
