#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Livestock classification of registry descriptions.
//!
//! Registry descriptions are free Dutch text ("Het houden van leghennen",
//! "Melkveehouderij"). Each species has a keyword list; a description sets
//! the flag of every species whose keywords it contains, so one company may
//! keep several species. The main type is then picked by fixed priority.

pub mod estimate;
pub mod stats;

use livestock_map_building_models::{AnimalFlags, ClassifiedCompany, RegistryEntry};

pub use estimate::{density_square_meters_per_animal, estimate_animal_count};
pub use stats::{LivestockStats, StatsRow};

const CHICKEN_KEYWORDS: &[&str] = &[
    "kippen",
    "pluimvee",
    "leghennen",
    "vleeskuikens",
    "legkippen",
    "eieren",
    "kuikens",
];
const PIG_KEYWORDS: &[&str] = &["varken", "zeugen", "biggen"];
const CATTLE_KEYWORDS: &[&str] = &[
    "rundvee",
    "melkvee",
    "koeien",
    "vleesvee",
    "kalveren",
    "runderen",
    "zoogkoeien",
];
const SHEEP_KEYWORDS: &[&str] = &["schapen", "schaap"];
const GOAT_KEYWORDS: &[&str] = &["geiten", "geit"];

/// Sets a flag for every species mentioned in `description`.
#[must_use]
pub fn classify(description: &str) -> AnimalFlags {
    let lower = description.to_lowercase();

    AnimalFlags {
        chicken: contains_any(&lower, CHICKEN_KEYWORDS),
        pig: contains_any(&lower, PIG_KEYWORDS),
        cattle: contains_any(&lower, CATTLE_KEYWORDS),
        sheep: contains_any(&lower, SHEEP_KEYWORDS),
        goat: contains_any(&lower, GOAT_KEYWORDS),
    }
}

/// Classifies a registry entry. The animal count starts at zero and is
/// filled in once buildings are linked.
#[must_use]
pub fn classify_entry(entry: &RegistryEntry) -> ClassifiedCompany {
    ClassifiedCompany {
        description: entry.description.clone(),
        active: entry.active,
        flags: classify(&entry.description),
        animal_count: 0.0,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
