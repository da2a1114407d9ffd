//! In-process store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use livestock_map_building_models::{
    Address, BoundingBox, BuildingRecord, ClassifiedCompany, CompanyKey, CompanyRecord, Tile,
    TileId, TileOutcome, TileStatus,
};

use crate::{
    AddressRepository, BuildingRepository, CompanyRepository, DbError, TileRepository, not_found,
};

#[derive(Debug, Default)]
struct MemoryState {
    next_tile_id: i64,
    tiles: BTreeMap<TileId, Tile>,
    addresses: BTreeMap<i64, Address>,
    buildings: BTreeMap<i64, BuildingRecord>,
    next_company_seq: u64,
    companies: BTreeMap<CompanyKey, (u64, ClassifiedCompany)>,
}

impl MemoryState {
    fn tile_mut(&mut self, id: TileId) -> Result<&mut Tile, DbError> {
        self.tiles
            .get_mut(&id)
            .ok_or_else(|| not_found(format!("tile {id}")))
    }

    fn companies_sorted(&self) -> Vec<CompanyRecord> {
        let mut companies = self
            .companies
            .iter()
            .map(|(key, (seq, company))| {
                (
                    *seq,
                    CompanyRecord {
                        address_id: key.address_id,
                        company: company.clone(),
                    },
                )
            })
            .collect::<Vec<_>>();
        companies.sort_by_key(|(seq, _)| *seq);
        companies.into_iter().map(|(_, record)| record).collect()
    }
}

/// Repository that keeps everything in memory behind one mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TileRepository for MemoryStore {
    fn upsert_tile(&self, bbox: &BoundingBox, level: u32) -> Result<(Tile, bool), DbError> {
        let mut state = self.lock();

        if let Some(existing) = state
            .tiles
            .values()
            .find(|t| t.bbox == *bbox && t.level == level)
        {
            return Ok((existing.clone(), false));
        }

        state.next_tile_id += 1;
        let now = Utc::now();
        let tile = Tile {
            id: TileId(state.next_tile_id),
            bbox: *bbox,
            level,
            status: TileStatus::Pending,
            error_message: String::new(),
            duration_seconds: None,
            building_count: None,
            company_count: None,
            created_at: now,
            updated_at: now,
        };
        state.tiles.insert(tile.id, tile.clone());
        Ok((tile, true))
    }

    fn claim_next_pending(&self) -> Result<Option<Tile>, DbError> {
        let mut state = self.lock();
        let claimed = state
            .tiles
            .values_mut()
            .find(|t| t.status == TileStatus::Pending)
            .map(|tile| {
                tile.status = TileStatus::InProgress;
                tile.updated_at = Utc::now();
                tile.clone()
            });
        Ok(claimed)
    }

    fn release_tile(&self, id: TileId) -> Result<(), DbError> {
        let mut state = self.lock();
        let tile = state.tile_mut(id)?;
        if tile.status == TileStatus::InProgress {
            tile.status = TileStatus::Pending;
            tile.updated_at = Utc::now();
        }
        Ok(())
    }

    fn complete_tile(&self, id: TileId, outcome: &TileOutcome) -> Result<(), DbError> {
        let mut state = self.lock();
        let tile = state.tile_mut(id)?;
        tile.status = TileStatus::Complete;
        tile.error_message.clear();
        tile.duration_seconds = Some(outcome.duration_seconds);
        tile.building_count = Some(outcome.building_count);
        tile.company_count = Some(outcome.company_count);
        tile.updated_at = Utc::now();
        Ok(())
    }

    fn fail_tile(&self, id: TileId, error: &str, duration_seconds: f64) -> Result<(), DbError> {
        let mut state = self.lock();
        let tile = state.tile_mut(id)?;
        tile.status = TileStatus::Failed;
        tile.error_message = error.to_string();
        tile.duration_seconds = Some(duration_seconds);
        tile.updated_at = Utc::now();
        Ok(())
    }

    fn requeue_failed(&self) -> Result<u64, DbError> {
        Ok(self.move_status(TileStatus::Failed, TileStatus::Pending))
    }

    fn reset_in_progress(&self) -> Result<u64, DbError> {
        Ok(self.move_status(TileStatus::InProgress, TileStatus::Pending))
    }

    fn tile(&self, id: TileId) -> Result<Option<Tile>, DbError> {
        Ok(self.lock().tiles.get(&id).cloned())
    }

    fn tiles(&self) -> Result<Vec<Tile>, DbError> {
        Ok(self.lock().tiles.values().cloned().collect())
    }

    fn delete_all_tiles(&self) -> Result<u64, DbError> {
        let mut state = self.lock();
        let count = state.tiles.len() as u64;
        state.tiles.clear();
        Ok(count)
    }
}

impl MemoryStore {
    fn move_status(&self, from: TileStatus, to: TileStatus) -> u64 {
        let mut state = self.lock();
        let now = Utc::now();
        let mut moved = 0;
        for tile in state.tiles.values_mut().filter(|t| t.status == from) {
            tile.status = to;
            tile.updated_at = now;
            moved += 1;
        }
        moved
    }
}

impl AddressRepository for MemoryStore {
    fn upsert_address(&self, address: &Address) -> Result<(), DbError> {
        self.lock()
            .addresses
            .insert(address.external_id, address.clone());
        Ok(())
    }

    fn address(&self, external_id: i64) -> Result<Option<Address>, DbError> {
        Ok(self.lock().addresses.get(&external_id).cloned())
    }

    fn addresses(&self, external_ids: &[i64]) -> Result<Vec<Address>, DbError> {
        let state = self.lock();
        Ok(external_ids
            .iter()
            .filter_map(|id| state.addresses.get(id).cloned())
            .collect())
    }
}

impl BuildingRepository for MemoryStore {
    fn upsert_building(&self, record: &BuildingRecord) -> Result<(), DbError> {
        self.lock().buildings.insert(record.id(), record.clone());
        Ok(())
    }

    fn building(&self, id: i64) -> Result<Option<BuildingRecord>, DbError> {
        Ok(self.lock().buildings.get(&id).cloned())
    }

    fn buildings(&self) -> Result<Vec<BuildingRecord>, DbError> {
        Ok(self.lock().buildings.values().cloned().collect())
    }

    fn buildings_linked_to(&self, key: &CompanyKey) -> Result<Vec<BuildingRecord>, DbError> {
        Ok(self
            .lock()
            .buildings
            .values()
            .filter(|b| b.linked_company.as_ref() == Some(key))
            .cloned()
            .collect())
    }

    fn delete_all_buildings(&self) -> Result<u64, DbError> {
        let mut state = self.lock();
        let count = state.buildings.len() as u64;
        state.buildings.clear();
        Ok(count)
    }
}

impl CompanyRepository for MemoryStore {
    fn upsert_company(&self, record: &CompanyRecord) -> Result<(), DbError> {
        let mut state = self.lock();
        let key = record.key();
        if let Some((_, company)) = state.companies.get_mut(&key) {
            *company = record.company.clone();
        } else {
            let seq = state.next_company_seq;
            state.next_company_seq += 1;
            state.companies.insert(key, (seq, record.company.clone()));
        }
        Ok(())
    }

    fn company(&self, key: &CompanyKey) -> Result<Option<CompanyRecord>, DbError> {
        Ok(self
            .lock()
            .companies
            .get(key)
            .map(|(_, company)| CompanyRecord {
                address_id: key.address_id,
                company: company.clone(),
            }))
    }

    fn companies_at(&self, address_id: i64) -> Result<Vec<CompanyRecord>, DbError> {
        Ok(self
            .lock()
            .companies_sorted()
            .into_iter()
            .filter(|c| c.address_id == address_id)
            .collect())
    }

    fn companies(&self) -> Result<Vec<CompanyRecord>, DbError> {
        Ok(self.lock().companies_sorted())
    }

    fn delete_companies_without_description(&self) -> Result<u64, DbError> {
        let mut state = self.lock();
        let before = state.companies.len();
        state
            .companies
            .retain(|key, _| !key.description.trim().is_empty());
        Ok((before - state.companies.len()) as u64)
    }
}
