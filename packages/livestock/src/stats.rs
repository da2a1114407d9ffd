//! Totals per main animal type.

use livestock_map_building_models::{AnimalType, ClassifiedCompany};
use serde::Serialize;

/// Active companies and estimated animals for one main type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsRow {
    pub animal_type: AnimalType,
    pub companies: u64,
    pub animals: f64,
}

/// Per-type totals over active companies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivestockStats {
    rows: Vec<StatsRow>,
}

impl LivestockStats {
    #[must_use]
    pub fn from_companies<'a>(companies: impl IntoIterator<Item = &'a ClassifiedCompany>) -> Self {
        let mut rows = AnimalType::all()
            .iter()
            .map(|&animal_type| StatsRow {
                animal_type,
                companies: 0,
                animals: 0.0,
            })
            .collect::<Vec<_>>();

        for company in companies.into_iter().filter(|c| c.active) {
            let main = company.main_animal_type();
            if let Some(row) = rows.iter_mut().find(|r| r.animal_type == main) {
                row.companies += 1;
                row.animals += company.animal_count;
            }
        }

        Self { rows }
    }

    /// One row per animal type, in priority order.
    #[must_use]
    pub fn rows(&self) -> &[StatsRow] {
        &self.rows
    }

    #[must_use]
    pub fn get(&self, animal_type: AnimalType) -> Option<&StatsRow> {
        self.rows.iter().find(|r| r.animal_type == animal_type)
    }
}
