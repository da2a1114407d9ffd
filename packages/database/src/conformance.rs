//! Behavior every [`Repository`] implementation must share.

use std::collections::BTreeMap;

use livestock_map_building_models::{
    Address, AnimalFlags, BoundingBox, BuildingMetrics, BuildingRecord, ClassifiedCompany,
    CompanyKey, CompanyRecord, LatLon, RawBuilding, TileOutcome, TileStatus,
};

use crate::Repository;

fn bbox(offset: f64) -> BoundingBox {
    BoundingBox::new(5.0 + offset, 5.1 + offset, 52.0, 52.1).unwrap()
}

fn address(id: i64, street: &str) -> Address {
    Address {
        external_id: id,
        lat: 52.05,
        lon: 5.05,
        street: street.to_string(),
        house_number: "1".to_string(),
        postcode: Some("6741 AB".to_string()),
        city: Some("Lunteren".to_string()),
        nearby_address_count: Some(3),
    }
}

fn company(address_id: i64, description: &str, active: bool) -> CompanyRecord {
    CompanyRecord {
        address_id,
        company: ClassifiedCompany {
            description: description.to_string(),
            active,
            flags: AnimalFlags {
                pig: true,
                ..AnimalFlags::default()
            },
            animal_count: 0.0,
        },
    }
}

fn building(id: i64) -> BuildingRecord {
    let mut tags = BTreeMap::new();
    tags.insert("building".to_string(), "farm_auxiliary".to_string());
    BuildingRecord {
        building: RawBuilding {
            id,
            tags,
            geometry: vec![
                LatLon::new(52.0, 5.0),
                LatLon::new(52.0, 5.001),
                LatLon::new(52.001, 5.001),
                LatLon::new(52.0, 5.0),
            ],
        },
        metrics: BuildingMetrics {
            area_square_meters: 1234.5,
            length_meters: 60.0,
            width_meters: 20.5,
        },
        nearby_addresses: vec![7, 3],
        linked_company: None,
    }
}

pub fn tile_lifecycle(repo: &dyn Repository) {
    let (tile, created) = repo.upsert_tile(&bbox(0.0), 0).unwrap();
    assert!(created);
    assert_eq!(tile.status, TileStatus::Pending);
    assert!(tile.error_message.is_empty());

    let claimed = repo.claim_next_pending().unwrap().unwrap();
    assert_eq!(claimed.id, tile.id);
    assert_eq!(claimed.status, TileStatus::InProgress);

    repo.fail_tile(tile.id, "registry down", 1.5).unwrap();
    let failed = repo.tile(tile.id).unwrap().unwrap();
    assert_eq!(failed.status, TileStatus::Failed);
    assert_eq!(failed.error_message, "registry down");

    repo.complete_tile(
        tile.id,
        &TileOutcome {
            duration_seconds: 12.5,
            building_count: 8,
            company_count: 2,
        },
    )
    .unwrap();
    let complete = repo.tile(tile.id).unwrap().unwrap();
    assert_eq!(complete.status, TileStatus::Complete);
    assert!(complete.error_message.is_empty());
    assert_eq!(complete.building_count, Some(8));
    assert_eq!(complete.company_count, Some(2));
    assert_eq!(complete.duration_seconds, Some(12.5));
    assert_eq!(complete.bbox, bbox(0.0));

    assert!(repo.claim_next_pending().unwrap().is_none());
    assert_eq!(repo.delete_all_tiles().unwrap(), 1);
    assert!(repo.tiles().unwrap().is_empty());
}

pub fn tile_upsert_is_idempotent(repo: &dyn Repository) {
    let (first, created) = repo.upsert_tile(&bbox(0.0), 0).unwrap();
    assert!(created);
    let (again, created) = repo.upsert_tile(&bbox(0.0), 0).unwrap();
    assert!(!created);
    assert_eq!(again.id, first.id);

    let (other_level, created) = repo.upsert_tile(&bbox(0.0), 1).unwrap();
    assert!(created);
    assert_ne!(other_level.id, first.id);

    assert_eq!(repo.tiles().unwrap().len(), 2);
}

pub fn claims_are_exclusive(repo: &dyn Repository) {
    repo.upsert_tile(&bbox(0.0), 0).unwrap();
    repo.upsert_tile(&bbox(0.1), 0).unwrap();

    let a = repo.claim_next_pending().unwrap().unwrap();
    let b = repo.claim_next_pending().unwrap().unwrap();
    assert_ne!(a.id, b.id);
    assert!(a.id < b.id);
    assert!(repo.claim_next_pending().unwrap().is_none());

    repo.release_tile(a.id).unwrap();
    let again = repo.claim_next_pending().unwrap().unwrap();
    assert_eq!(again.id, a.id);
}

pub fn requeue_and_reset(repo: &dyn Repository) {
    let (a, _) = repo.upsert_tile(&bbox(0.0), 0).unwrap();
    let (b, _) = repo.upsert_tile(&bbox(0.1), 0).unwrap();
    repo.upsert_tile(&bbox(0.2), 0).unwrap();

    repo.claim_next_pending().unwrap();
    repo.fail_tile(a.id, "boom", 0.1).unwrap();
    repo.claim_next_pending().unwrap();

    assert_eq!(repo.requeue_failed().unwrap(), 1);
    assert_eq!(repo.reset_in_progress().unwrap(), 1);

    let statuses = repo
        .tiles()
        .unwrap()
        .iter()
        .map(|t| t.status)
        .collect::<Vec<_>>();
    assert_eq!(statuses, vec![TileStatus::Pending; 3]);
    assert_eq!(repo.tile(b.id).unwrap().unwrap().status, TileStatus::Pending);
}

pub fn address_upsert_refreshes_fields(repo: &dyn Repository) {
    repo.upsert_address(&address(7, "Postweg")).unwrap();
    let mut changed = address(7, "Postweg");
    changed.nearby_address_count = Some(9);
    changed.postcode = None;
    repo.upsert_address(&changed).unwrap();
    repo.upsert_address(&address(3, "Dorpsstraat")).unwrap();

    assert_eq!(repo.address(7).unwrap(), Some(changed));
    assert!(repo.address(99).unwrap().is_none());

    let found = repo.addresses(&[3, 99, 7]).unwrap();
    let ids = found.iter().map(|a| a.external_id).collect::<Vec<_>>();
    assert_eq!(ids, vec![3, 7]);
}

pub fn building_round_trip_and_links(repo: &dyn Repository) {
    let record = building(42);
    repo.upsert_building(&record).unwrap();
    assert_eq!(repo.building(42).unwrap(), Some(record.clone()));

    let key = CompanyKey {
        address_id: 7,
        description: "Varkenshouderij".to_string(),
    };
    let mut linked = record;
    linked.linked_company = Some(key.clone());
    repo.upsert_building(&linked).unwrap();
    repo.upsert_building(&building(43)).unwrap();

    let buildings = repo.buildings_linked_to(&key).unwrap();
    assert_eq!(buildings.len(), 1);
    assert_eq!(buildings[0].id(), 42);
    assert_eq!(repo.buildings().unwrap().len(), 2);

    assert_eq!(repo.delete_all_buildings().unwrap(), 2);
    assert!(repo.building(42).unwrap().is_none());
}

pub fn company_order_and_cleanup(repo: &dyn Repository) {
    repo.upsert_company(&company(7, "Zeugenhouderij", true)).unwrap();
    repo.upsert_company(&company(7, "Akkerbouw", false)).unwrap();
    repo.upsert_company(&company(3, "", true)).unwrap();

    let mut updated = company(7, "Zeugenhouderij", true);
    updated.company.animal_count = 1250.0;
    repo.upsert_company(&updated).unwrap();

    let at_seven = repo.companies_at(7).unwrap();
    let descriptions = at_seven
        .iter()
        .map(|c| c.company.description.as_str())
        .collect::<Vec<_>>();
    assert_eq!(descriptions, vec!["Zeugenhouderij", "Akkerbouw"]);
    assert!((at_seven[0].company.animal_count - 1250.0).abs() < f64::EPSILON);
    assert!(at_seven[0].company.flags.pig);

    let stored = repo.company(&updated.key()).unwrap().unwrap();
    assert_eq!(stored, updated);

    assert_eq!(repo.delete_companies_without_description().unwrap(), 1);
    assert_eq!(repo.companies().unwrap().len(), 2);
}
