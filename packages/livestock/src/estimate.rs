//! Animal count estimates from barn floor area.
//!
//! These are rough estimates, not measurements: they assume the whole
//! footprint of every linked building houses the company's main species at
//! a typical stocking density.

use livestock_map_building_models::AnimalType;

/// Typical floor area per animal in square meters.
#[must_use]
pub const fn density_square_meters_per_animal(animal_type: AnimalType) -> f64 {
    match animal_type {
        AnimalType::Cow => 1.7,
        AnimalType::Chicken => 0.04,
        AnimalType::Sheep => 0.6,
        AnimalType::Goat => 0.5,
        AnimalType::Pig | AnimalType::None => 0.8,
    }
}

/// Estimated number of animals housed in buildings with the given areas.
#[must_use]
pub fn estimate_animal_count(
    areas_square_meters: impl IntoIterator<Item = f64>,
    animal_type: AnimalType,
) -> f64 {
    let density = density_square_meters_per_animal(animal_type);
    areas_square_meters
        .into_iter()
        .map(|area| area / density)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pig_barn_of_1000_square_meters_holds_1250() {
        let count = estimate_animal_count([1000.0], AnimalType::Pig);
        assert!((count - 1250.0).abs() < 1e-9);
    }

    #[test]
    fn sums_over_buildings() {
        let count = estimate_animal_count([170.0, 340.0], AnimalType::Cow);
        assert!((count - 300.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_type_uses_default_density() {
        let count = estimate_animal_count([80.0], AnimalType::None);
        assert!((count - 100.0).abs() < 1e-9);
    }

    #[test]
    fn no_buildings_means_no_animals() {
        assert!(estimate_animal_count([], AnimalType::Chicken).abs() < f64::EPSILON);
    }
}
