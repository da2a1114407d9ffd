//! Typed decode of Overpass JSON responses.
//!
//! The response envelope is decoded strictly: a body that is not an
//! Overpass result, or whose elements have the wrong shape, is rejected as a
//! whole. Individual ways without usable geometry are skipped.

use std::collections::BTreeMap;

use livestock_map_building_models::{AddressNode, LatLon, RawBuilding};
use serde::Deserialize;

use crate::OsmError;

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    pub elements: Vec<Element>,
    /// Set by Overpass when the query hit a server-side limit.
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node(NodeElement),
    Way(WayElement),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct NodeElement {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct WayElement {
    pub id: i64,
    /// `out geom` emits `null` for vertices outside the query area.
    #[serde(default)]
    pub geometry: Vec<Option<GeometryPoint>>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeometryPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Decodes a raw Overpass body.
///
/// # Errors
///
/// Returns [`OsmError::Decode`] if the body is not a well-formed Overpass
/// response.
pub fn parse(body: &str) -> Result<OverpassResponse, OsmError> {
    let response: OverpassResponse =
        serde_json::from_str(body).map_err(|e| OsmError::Decode {
            message: e.to_string(),
        })?;

    if let Some(remark) = &response.remark {
        log::warn!("Overpass remark: {remark}");
    }

    Ok(response)
}

impl WayElement {
    /// Converts the way into a building, or `None` if its ring is unusable.
    #[must_use]
    pub fn into_building(self) -> Option<RawBuilding> {
        let geometry = self
            .geometry
            .iter()
            .map(|p| p.map(|p| LatLon::new(p.lat, p.lon)))
            .collect::<Option<Vec<_>>>();

        match geometry {
            Some(geometry) if geometry.len() >= 3 => Some(RawBuilding {
                id: self.id,
                tags: self.tags,
                geometry,
            }),
            Some(geometry) => {
                log::warn!(
                    "Skipping way {}: {} vertices is not a polygon",
                    self.id,
                    geometry.len()
                );
                None
            }
            None => {
                log::warn!("Skipping way {}: incomplete geometry", self.id);
                None
            }
        }
    }
}

impl From<NodeElement> for AddressNode {
    fn from(node: NodeElement) -> Self {
        Self {
            id: node.id,
            lat: node.lat,
            lon: node.lon,
            tags: node.tags,
        }
    }
}

impl OverpassResponse {
    /// Every way with a usable ring, converted to a building.
    #[must_use]
    pub fn into_buildings(self) -> Vec<RawBuilding> {
        self.elements
            .into_iter()
            .filter_map(|element| match element {
                Element::Way(way) => way.into_building(),
                Element::Node(_) | Element::Other => None,
            })
            .collect()
    }

    /// Every node, converted to an address node.
    #[must_use]
    pub fn into_address_nodes(self) -> Vec<AddressNode> {
        self.elements
            .into_iter()
            .filter_map(|element| match element {
                Element::Node(node) => Some(AddressNode::from(node)),
                Element::Way(_) | Element::Other => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILDINGS: &str = r#"{
        "version": 0.6,
        "generator": "Overpass API",
        "elements": [
            {
                "type": "way",
                "id": 123,
                "bounds": {"minlat": 52.0, "minlon": 5.0, "maxlat": 52.001, "maxlon": 5.001},
                "nodes": [1, 2, 3, 4, 1],
                "geometry": [
                    {"lat": 52.0, "lon": 5.0},
                    {"lat": 52.0, "lon": 5.001},
                    {"lat": 52.001, "lon": 5.001},
                    {"lat": 52.001, "lon": 5.0},
                    {"lat": 52.0, "lon": 5.0}
                ],
                "tags": {"building": "farm_auxiliary"}
            },
            {
                "type": "way",
                "id": 124,
                "geometry": [{"lat": 52.0, "lon": 5.0}, null, {"lat": 52.001, "lon": 5.0}],
                "tags": {"building": "barn"}
            },
            {
                "type": "way",
                "id": 125,
                "tags": {"building": "shed"}
            },
            {"type": "relation", "id": 9, "members": []}
        ]
    }"#;

    const ADDRESSES: &str = r#"{
        "elements": [
            {
                "type": "node",
                "id": 42,
                "lat": 52.0988,
                "lon": 5.5681,
                "tags": {"addr:street": "Postweg", "addr:housenumber": "227", "addr:city": "Lunteren"}
            },
            {"type": "node", "id": 43, "lat": 52.0989, "lon": 5.5682}
        ]
    }"#;

    #[test]
    fn decodes_buildings_and_skips_unusable_ways() {
        let buildings = parse(BUILDINGS).unwrap().into_buildings();

        assert_eq!(buildings.len(), 1);
        let building = &buildings[0];
        assert_eq!(building.id, 123);
        assert_eq!(building.geometry.len(), 5);
        assert_eq!(building.building_type(), Some("farm_auxiliary"));
        assert!((building.geometry[1].lon - 5.001).abs() < f64::EPSILON);
    }

    #[test]
    fn decodes_address_nodes() {
        let nodes = parse(ADDRESSES).unwrap().into_address_nodes();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, 42);
        assert_eq!(nodes[0].street(), Some("Postweg"));
        assert_eq!(nodes[0].house_number(), Some("227"));
        assert!(nodes[1].tags.is_empty());
    }

    #[test]
    fn rejects_non_overpass_body() {
        let result = parse("<html>rate limited</html>");
        assert!(matches!(result, Err(OsmError::Decode { .. })));

        let result = parse(r#"{"elements": [{"type": "node", "id": "x"}]}"#);
        assert!(matches!(result, Err(OsmError::Decode { .. })));
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let response = parse(r#"{"elements": []}"#).unwrap();
        assert!(response.into_buildings().is_empty());
    }
}
