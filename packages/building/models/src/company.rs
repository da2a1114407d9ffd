//! Registry companies and their livestock classification.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A single business record returned by the registry for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Free-text activity description.
    pub description: String,
    /// Whether the business is still registered as active.
    pub active: bool,
}

/// Dominant livestock category of a company.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AnimalType {
    /// Poultry.
    Chicken,
    /// Pigs.
    Pig,
    /// Cattle (dairy and beef).
    Cow,
    /// Sheep.
    Sheep,
    /// Goats.
    Goat,
    /// No livestock keyword matched.
    None,
}

impl AnimalType {
    /// Returns all variants, in main-type priority order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Chicken,
            Self::Pig,
            Self::Cow,
            Self::Sheep,
            Self::Goat,
            Self::None,
        ]
    }
}

/// Independent per-species keyword matches. Several may be set at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct AnimalFlags {
    /// Poultry keywords matched.
    pub chicken: bool,
    /// Pig keywords matched.
    pub pig: bool,
    /// Cattle keywords matched.
    pub cattle: bool,
    /// Sheep keywords matched.
    pub sheep: bool,
    /// Goat keywords matched.
    pub goat: bool,
}

impl AnimalFlags {
    /// Resolves the single main type by fixed priority:
    /// chicken, pig, cow, sheep, goat.
    #[must_use]
    pub const fn main_animal_type(&self) -> AnimalType {
        if self.chicken {
            AnimalType::Chicken
        } else if self.pig {
            AnimalType::Pig
        } else if self.cattle {
            AnimalType::Cow
        } else if self.sheep {
            AnimalType::Sheep
        } else if self.goat {
            AnimalType::Goat
        } else {
            AnimalType::None
        }
    }

    /// Returns `true` if any species matched.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.chicken || self.pig || self.cattle || self.sheep || self.goat
    }
}

/// A registry entry with its livestock classification attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedCompany {
    /// Registry activity description.
    pub description: String,
    /// Whether the business is active.
    pub active: bool,
    /// Matched species.
    pub flags: AnimalFlags,
    /// Estimated number of animals across all linked buildings.
    pub animal_count: f64,
}

impl ClassifiedCompany {
    /// Main type, derived from [`Self::flags`].
    #[must_use]
    pub const fn main_animal_type(&self) -> AnimalType {
        self.flags.main_animal_type()
    }

    /// Active and keeping some kind of livestock.
    #[must_use]
    pub const fn is_active_livestock(&self) -> bool {
        self.active && self.flags.any()
    }
}

/// Natural key of a stored company: the address it was found at plus its
/// registry description.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompanyKey {
    /// External id of the address.
    pub address_id: i64,
    /// Registry description.
    pub description: String,
}

/// A classified company together with the address it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// External id of the address the registry returned this company for.
    pub address_id: i64,
    /// The company itself.
    pub company: ClassifiedCompany,
}

impl CompanyRecord {
    /// Natural key used for upserts and building links.
    #[must_use]
    pub fn key(&self) -> CompanyKey {
        CompanyKey {
            address_id: self.address_id,
            description: self.company.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chicken_beats_cattle() {
        let flags = AnimalFlags {
            chicken: true,
            cattle: true,
            ..AnimalFlags::default()
        };
        assert_eq!(flags.main_animal_type(), AnimalType::Chicken);
    }

    #[test]
    fn pig_beats_sheep_and_goat() {
        let flags = AnimalFlags {
            pig: true,
            sheep: true,
            goat: true,
            ..AnimalFlags::default()
        };
        assert_eq!(flags.main_animal_type(), AnimalType::Pig);
    }

    #[test]
    fn no_flags_is_none() {
        assert_eq!(AnimalFlags::default().main_animal_type(), AnimalType::None);
        assert!(!AnimalFlags::default().any());
    }

    #[test]
    fn animal_type_round_trips_through_strings() {
        for animal in AnimalType::all() {
            let parsed: AnimalType = animal.as_ref().parse().unwrap();
            assert_eq!(parsed, *animal);
        }
        assert_eq!(AnimalType::Chicken.to_string(), "CHICKEN");
    }

    #[test]
    fn inactive_company_is_not_livestock() {
        let company = ClassifiedCompany {
            description: "Houden van varkens".to_string(),
            active: false,
            flags: AnimalFlags {
                pig: true,
                ..AnimalFlags::default()
            },
            animal_count: 0.0,
        };
        assert!(!company.is_active_livestock());
        assert_eq!(company.main_animal_type(), AnimalType::Pig);
    }
}
