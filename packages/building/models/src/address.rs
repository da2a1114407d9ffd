//! Street addresses found near buildings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::LatLon;

/// An address node as returned by the map-data provider.
///
/// Fields live in `addr:*` tags and any of them may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressNode {
    /// Provider node id.
    pub id: i64,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Raw provider tags.
    pub tags: BTreeMap<String, String>,
}

impl AddressNode {
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// `addr:street`
    #[must_use]
    pub fn street(&self) -> Option<&str> {
        self.tag("addr:street")
    }

    /// `addr:housenumber`
    #[must_use]
    pub fn house_number(&self) -> Option<&str> {
        self.tag("addr:housenumber")
    }

    /// `addr:postcode`
    #[must_use]
    pub fn postcode(&self) -> Option<&str> {
        self.tag("addr:postcode")
    }

    /// `addr:city`
    #[must_use]
    pub fn city(&self) -> Option<&str> {
        self.tag("addr:city")
    }

    /// Location of the node.
    #[must_use]
    pub const fn location(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }
}

/// Identity of a physical address.
///
/// The same address is regularly mapped as several provider nodes, so
/// deduplication ignores the external id and compares these fields only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AddressKey {
    /// Street name.
    pub street: String,
    /// House number including any suffix (e.g. "12a").
    pub house_number: String,
    /// City, if tagged.
    pub city: Option<String>,
}

/// A usable street address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// Provider node id; the upsert key.
    pub external_id: i64,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Street name.
    pub street: String,
    /// House number.
    pub house_number: String,
    /// Postcode, if tagged.
    pub postcode: Option<String>,
    /// City, if tagged.
    pub city: Option<String>,
    /// Number of raw address candidates returned by the proximity query
    /// that found this address. Used as a local density signal.
    pub nearby_address_count: Option<u32>,
}

impl Address {
    /// Builds an address from a provider node.
    ///
    /// Returns `None` when the node has no street or no house number, since
    /// such an address cannot be looked up in the registry.
    #[must_use]
    pub fn from_node(node: &AddressNode) -> Option<Self> {
        let street = node.street()?;
        let house_number = node.house_number()?;

        Some(Self {
            external_id: node.id,
            lat: node.lat,
            lon: node.lon,
            street: street.to_string(),
            house_number: house_number.to_string(),
            postcode: node.postcode().map(String::from),
            city: node.city().map(String::from),
            nearby_address_count: None,
        })
    }

    /// Deduplication identity.
    #[must_use]
    pub fn key(&self) -> AddressKey {
        AddressKey {
            street: self.street.clone(),
            house_number: self.house_number.clone(),
            city: self.city.clone(),
        }
    }

    /// Location of the address.
    #[must_use]
    pub const fn location(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }

    /// Free-text form used for registry lookups, e.g. `"Postweg 227 Lunteren"`.
    #[must_use]
    pub fn lookup_text(&self) -> String {
        self.city.as_deref().map_or_else(
            || format!("{} {}", self.street, self.house_number),
            |city| format!("{} {} {city}", self.street, self.house_number),
        )
    }
}
