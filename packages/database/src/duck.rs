//! `DuckDB`-backed store.
//!
//! One file holds four tables: `tiles`, `addresses`, `buildings` and
//! `companies`. Free-form values (tags, geometry, nearby address ids) are
//! stored as JSON text, timestamps as RFC 3339 text. Every call goes through
//! a single connection behind a mutex, which also makes the tile claim
//! atomic.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use duckdb::{Connection, Row, params};
use livestock_map_building_models::{
    Address, AnimalFlags, BoundingBox, BuildingMetrics, BuildingRecord, ClassifiedCompany,
    CompanyKey, CompanyRecord, RawBuilding, Tile, TileId, TileOutcome, TileStatus,
};

use crate::{
    AddressRepository, BuildingRepository, CompanyRepository, DbError, TileRepository, not_found,
};

const TILE_COLUMNS: &str = "id, lon_min, lon_max, lat_min, lat_max, level, status, \
     error_message, duration_seconds, building_count, company_count, created_at, updated_at";

const ADDRESS_COLUMNS: &str =
    "external_id, lat, lon, street, house_number, postcode, city, nearby_address_count";

const BUILDING_COLUMNS: &str = "id, tags, geometry, area_square_meters, length_meters, \
     width_meters, nearby_addresses, company_address_id, company_description";

const COMPANY_COLUMNS: &str =
    "address_id, description, active, chicken, pig, cattle, sheep, goat, animal_count";

/// Repository persisted in a `DuckDB` file.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore").finish_non_exhaustive()
    }
}

impl DuckDbStore {
    /// Opens (or creates) the database at `path` and ensures the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection, or schema cannot
    /// be created.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }

        log::info!("Opening database {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens the database at the default path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_default() -> Result<Self, DbError> {
        Self::open(&crate::paths::default_db_path())
    }

    /// Opens a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS tile_id_seq START 1;
        CREATE SEQUENCE IF NOT EXISTS company_id_seq START 1;

        CREATE TABLE IF NOT EXISTS tiles (
            id BIGINT PRIMARY KEY DEFAULT nextval('tile_id_seq'),
            lon_min DOUBLE NOT NULL,
            lon_max DOUBLE NOT NULL,
            lat_min DOUBLE NOT NULL,
            lat_max DOUBLE NOT NULL,
            level BIGINT NOT NULL,
            status TEXT NOT NULL,
            error_message TEXT NOT NULL DEFAULT '',
            duration_seconds DOUBLE,
            building_count BIGINT,
            company_count BIGINT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS addresses (
            external_id BIGINT PRIMARY KEY,
            lat DOUBLE NOT NULL,
            lon DOUBLE NOT NULL,
            street TEXT NOT NULL,
            house_number TEXT NOT NULL,
            postcode TEXT,
            city TEXT,
            nearby_address_count BIGINT
        );

        CREATE TABLE IF NOT EXISTS buildings (
            id BIGINT PRIMARY KEY,
            tags TEXT NOT NULL,
            geometry TEXT NOT NULL,
            area_square_meters DOUBLE NOT NULL,
            length_meters DOUBLE NOT NULL,
            width_meters DOUBLE NOT NULL,
            nearby_addresses TEXT NOT NULL,
            company_address_id BIGINT,
            company_description TEXT
        );

        CREATE TABLE IF NOT EXISTS companies (
            -- insertion order, kept across upserts; companies_at returns oldest first
            id BIGINT NOT NULL DEFAULT nextval('company_id_seq'),
            address_id BIGINT NOT NULL,
            description TEXT NOT NULL,
            active BOOLEAN NOT NULL,
            chicken BOOLEAN NOT NULL,
            pig BOOLEAN NOT NULL,
            cattle BOOLEAN NOT NULL,
            sheep BOOLEAN NOT NULL,
            goat BOOLEAN NOT NULL,
            animal_type_main TEXT NOT NULL,
            animal_count DOUBLE NOT NULL,
            PRIMARY KEY (address_id, description)
        );",
    )?;
    Ok(())
}

fn conversion(message: impl Into<String>) -> DbError {
    DbError::Conversion {
        message: message.into(),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion(format!("invalid timestamp '{value}': {e}")))
}

fn to_u64(value: Option<i64>) -> Result<Option<u64>, DbError> {
    value
        .map(|v| u64::try_from(v).map_err(|e| conversion(format!("negative count {v}: {e}"))))
        .transpose()
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn tile_from_row(row: &Row<'_>) -> Result<Tile, DbError> {
    let bbox = BoundingBox::new(row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)
        .map_err(|e| conversion(e.to_string()))?;
    let level: i64 = row.get(5)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;

    Ok(Tile {
        id: TileId(row.get(0)?),
        bbox,
        level: u32::try_from(level).map_err(|e| conversion(format!("level {level}: {e}")))?,
        status: TileStatus::from_str(&status)
            .map_err(|e| conversion(format!("tile status '{status}': {e}")))?,
        error_message: row.get(7)?,
        duration_seconds: row.get(8)?,
        building_count: to_u64(row.get(9)?)?,
        company_count: to_u64(row.get(10)?)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn address_from_row(row: &Row<'_>) -> Result<Address, DbError> {
    let nearby: Option<i64> = row.get(7)?;
    Ok(Address {
        external_id: row.get(0)?,
        lat: row.get(1)?,
        lon: row.get(2)?,
        street: row.get(3)?,
        house_number: row.get(4)?,
        postcode: row.get(5)?,
        city: row.get(6)?,
        nearby_address_count: nearby.map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
    })
}

fn building_from_row(row: &Row<'_>) -> Result<BuildingRecord, DbError> {
    let tags: String = row.get(1)?;
    let geometry: String = row.get(2)?;
    let nearby: String = row.get(6)?;
    let company_address_id: Option<i64> = row.get(7)?;
    let company_description: Option<String> = row.get(8)?;

    Ok(BuildingRecord {
        building: RawBuilding {
            id: row.get(0)?,
            tags: serde_json::from_str(&tags)?,
            geometry: serde_json::from_str(&geometry)?,
        },
        metrics: BuildingMetrics {
            area_square_meters: row.get(3)?,
            length_meters: row.get(4)?,
            width_meters: row.get(5)?,
        },
        nearby_addresses: serde_json::from_str(&nearby)?,
        linked_company: company_address_id
            .zip(company_description)
            .map(|(address_id, description)| CompanyKey {
                address_id,
                description,
            }),
    })
}

fn company_from_row(row: &Row<'_>) -> Result<CompanyRecord, DbError> {
    Ok(CompanyRecord {
        address_id: row.get(0)?,
        company: ClassifiedCompany {
            description: row.get(1)?,
            active: row.get(2)?,
            flags: AnimalFlags {
                chicken: row.get(3)?,
                pig: row.get(4)?,
                cattle: row.get(5)?,
                sheep: row.get(6)?,
                goat: row.get(7)?,
            },
            animal_count: row.get(8)?,
        },
    })
}

fn query_tiles(
    conn: &Connection,
    where_clause: &str,
    id: Option<i64>,
) -> Result<Vec<Tile>, DbError> {
    let sql = format!("SELECT {TILE_COLUMNS} FROM tiles {where_clause} ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = match id {
        Some(id) => stmt.query(params![id])?,
        None => stmt.query([])?,
    };

    let mut tiles = Vec::new();
    while let Some(row) = rows.next()? {
        tiles.push(tile_from_row(row)?);
    }
    Ok(tiles)
}

fn query_one_tile(conn: &Connection, id: TileId) -> Result<Option<Tile>, DbError> {
    Ok(query_tiles(conn, "WHERE id = ?", Some(id.0))?.into_iter().next())
}

fn ensure_updated(changed: usize, id: TileId) -> Result<(), DbError> {
    if changed == 0 {
        Err(not_found(format!("tile {id}")))
    } else {
        Ok(())
    }
}

impl TileRepository for DuckDbStore {
    fn upsert_tile(&self, bbox: &BoundingBox, level: u32) -> Result<(Tile, bool), DbError> {
        let conn = self.conn();

        let existing: Option<i64> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM tiles
                 WHERE lon_min = ? AND lon_max = ? AND lat_min = ? AND lat_max = ? AND level = ?",
            )?;
            let mut rows = stmt.query(params![
                bbox.lon_min(),
                bbox.lon_max(),
                bbox.lat_min(),
                bbox.lat_max(),
                i64::from(level),
            ])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };

        if let Some(id) = existing {
            let tile = query_one_tile(&conn, TileId(id))?
                .ok_or_else(|| not_found(format!("tile {id}")))?;
            return Ok((tile, false));
        }

        let now = Utc::now().to_rfc3339();
        let id: i64 = conn.query_row(
            "INSERT INTO tiles (lon_min, lon_max, lat_min, lat_max, level, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
            params![
                bbox.lon_min(),
                bbox.lon_max(),
                bbox.lat_min(),
                bbox.lat_max(),
                i64::from(level),
                TileStatus::Pending.as_ref(),
                now,
                now,
            ],
            |row| row.get(0),
        )?;

        let tile = query_one_tile(&conn, TileId(id))?
            .ok_or_else(|| not_found(format!("tile {id}")))?;
        Ok((tile, true))
    }

    fn claim_next_pending(&self) -> Result<Option<Tile>, DbError> {
        let conn = self.conn();

        let next: Option<i64> = {
            let mut stmt =
                conn.prepare("SELECT id FROM tiles WHERE status = ? ORDER BY id LIMIT 1")?;
            let mut rows = stmt.query(params![TileStatus::Pending.as_ref()])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };
        let Some(id) = next.map(TileId) else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE tiles SET status = ?, updated_at = ? WHERE id = ?",
            params![TileStatus::InProgress.as_ref(), Utc::now().to_rfc3339(), id.0],
        )?;

        query_one_tile(&conn, id)
    }

    fn release_tile(&self, id: TileId) -> Result<(), DbError> {
        let conn = self.conn();
        if query_one_tile(&conn, id)?.is_none() {
            return Err(not_found(format!("tile {id}")));
        }
        conn.execute(
            "UPDATE tiles SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            params![
                TileStatus::Pending.as_ref(),
                Utc::now().to_rfc3339(),
                id.0,
                TileStatus::InProgress.as_ref(),
            ],
        )?;
        Ok(())
    }

    fn complete_tile(&self, id: TileId, outcome: &TileOutcome) -> Result<(), DbError> {
        let changed = self.conn().execute(
            "UPDATE tiles
             SET status = ?, error_message = '', duration_seconds = ?,
                 building_count = ?, company_count = ?, updated_at = ?
             WHERE id = ?",
            params![
                TileStatus::Complete.as_ref(),
                outcome.duration_seconds,
                to_i64(outcome.building_count),
                to_i64(outcome.company_count),
                Utc::now().to_rfc3339(),
                id.0,
            ],
        )?;
        ensure_updated(changed, id)
    }

    fn fail_tile(&self, id: TileId, error: &str, duration_seconds: f64) -> Result<(), DbError> {
        let changed = self.conn().execute(
            "UPDATE tiles
             SET status = ?, error_message = ?, duration_seconds = ?, updated_at = ?
             WHERE id = ?",
            params![
                TileStatus::Failed.as_ref(),
                error,
                duration_seconds,
                Utc::now().to_rfc3339(),
                id.0,
            ],
        )?;
        ensure_updated(changed, id)
    }

    fn requeue_failed(&self) -> Result<u64, DbError> {
        let changed = self.conn().execute(
            "UPDATE tiles SET status = ?, updated_at = ? WHERE status = ?",
            params![
                TileStatus::Pending.as_ref(),
                Utc::now().to_rfc3339(),
                TileStatus::Failed.as_ref(),
            ],
        )?;
        Ok(changed as u64)
    }

    fn reset_in_progress(&self) -> Result<u64, DbError> {
        let changed = self.conn().execute(
            "UPDATE tiles SET status = ?, updated_at = ? WHERE status = ?",
            params![
                TileStatus::Pending.as_ref(),
                Utc::now().to_rfc3339(),
                TileStatus::InProgress.as_ref(),
            ],
        )?;
        Ok(changed as u64)
    }

    fn tile(&self, id: TileId) -> Result<Option<Tile>, DbError> {
        query_one_tile(&self.conn(), id)
    }

    fn tiles(&self) -> Result<Vec<Tile>, DbError> {
        query_tiles(&self.conn(), "", None)
    }

    fn delete_all_tiles(&self) -> Result<u64, DbError> {
        Ok(self.conn().execute("DELETE FROM tiles", [])? as u64)
    }
}

impl AddressRepository for DuckDbStore {
    fn upsert_address(&self, address: &Address) -> Result<(), DbError> {
        self.conn().execute(
            &format!(
                "INSERT INTO addresses ({ADDRESS_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (external_id) DO UPDATE SET
                    lat = EXCLUDED.lat,
                    lon = EXCLUDED.lon,
                    street = EXCLUDED.street,
                    house_number = EXCLUDED.house_number,
                    postcode = EXCLUDED.postcode,
                    city = EXCLUDED.city,
                    nearby_address_count = EXCLUDED.nearby_address_count"
            ),
            params![
                address.external_id,
                address.lat,
                address.lon,
                address.street,
                address.house_number,
                address.postcode,
                address.city,
                address.nearby_address_count.map(i64::from),
            ],
        )?;
        Ok(())
    }

    fn address(&self, external_id: i64) -> Result<Option<Address>, DbError> {
        Ok(self.addresses(&[external_id])?.into_iter().next())
    }

    fn addresses(&self, external_ids: &[i64]) -> Result<Vec<Address>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE external_id = ?"
        ))?;

        let mut addresses = Vec::with_capacity(external_ids.len());
        for id in external_ids {
            let mut rows = stmt.query(params![id])?;
            if let Some(row) = rows.next()? {
                addresses.push(address_from_row(row)?);
            }
        }
        Ok(addresses)
    }
}

fn query_buildings(
    conn: &Connection,
    where_clause: &str,
    key: Option<&CompanyKey>,
) -> Result<Vec<BuildingRecord>, DbError> {
    let sql = format!("SELECT {BUILDING_COLUMNS} FROM buildings {where_clause} ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = match key {
        Some(key) => stmt.query(params![key.address_id, key.description])?,
        None => stmt.query([])?,
    };

    let mut buildings = Vec::new();
    while let Some(row) = rows.next()? {
        buildings.push(building_from_row(row)?);
    }
    Ok(buildings)
}

impl BuildingRepository for DuckDbStore {
    fn upsert_building(&self, record: &BuildingRecord) -> Result<(), DbError> {
        let tags = serde_json::to_string(&record.building.tags)?;
        let geometry = serde_json::to_string(&record.building.geometry)?;
        let nearby = serde_json::to_string(&record.nearby_addresses)?;
        let company = record.linked_company.as_ref();

        self.conn().execute(
            &format!(
                "INSERT INTO buildings ({BUILDING_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (id) DO UPDATE SET
                    tags = EXCLUDED.tags,
                    geometry = EXCLUDED.geometry,
                    area_square_meters = EXCLUDED.area_square_meters,
                    length_meters = EXCLUDED.length_meters,
                    width_meters = EXCLUDED.width_meters,
                    nearby_addresses = EXCLUDED.nearby_addresses,
                    company_address_id = EXCLUDED.company_address_id,
                    company_description = EXCLUDED.company_description"
            ),
            params![
                record.id(),
                tags,
                geometry,
                record.metrics.area_square_meters,
                record.metrics.length_meters,
                record.metrics.width_meters,
                nearby,
                company.map(|c| c.address_id),
                company.map(|c| c.description.as_str()),
            ],
        )?;
        Ok(())
    }

    fn building(&self, id: i64) -> Result<Option<BuildingRecord>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings WHERE id = ?"
        ))?;
        let mut rows = stmt.query(params![id])?;
        rows.next()?.map(building_from_row).transpose()
    }

    fn buildings(&self) -> Result<Vec<BuildingRecord>, DbError> {
        query_buildings(&self.conn(), "", None)
    }

    fn buildings_linked_to(&self, key: &CompanyKey) -> Result<Vec<BuildingRecord>, DbError> {
        query_buildings(
            &self.conn(),
            "WHERE company_address_id = ? AND company_description = ?",
            Some(key),
        )
    }

    fn delete_all_buildings(&self) -> Result<u64, DbError> {
        Ok(self.conn().execute("DELETE FROM buildings", [])? as u64)
    }
}

fn query_companies(
    conn: &Connection,
    where_clause: &str,
    address_id: Option<i64>,
) -> Result<Vec<CompanyRecord>, DbError> {
    let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies {where_clause} ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = match address_id {
        Some(id) => stmt.query(params![id])?,
        None => stmt.query([])?,
    };

    let mut companies = Vec::new();
    while let Some(row) = rows.next()? {
        companies.push(company_from_row(row)?);
    }
    Ok(companies)
}

impl CompanyRepository for DuckDbStore {
    fn upsert_company(&self, record: &CompanyRecord) -> Result<(), DbError> {
        let company = &record.company;
        let flags = company.flags;

        self.conn().execute(
            &format!(
                "INSERT INTO companies ({COMPANY_COLUMNS}, animal_type_main)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (address_id, description) DO UPDATE SET
                    active = EXCLUDED.active,
                    chicken = EXCLUDED.chicken,
                    pig = EXCLUDED.pig,
                    cattle = EXCLUDED.cattle,
                    sheep = EXCLUDED.sheep,
                    goat = EXCLUDED.goat,
                    animal_count = EXCLUDED.animal_count,
                    animal_type_main = EXCLUDED.animal_type_main"
            ),
            params![
                record.address_id,
                company.description,
                company.active,
                flags.chicken,
                flags.pig,
                flags.cattle,
                flags.sheep,
                flags.goat,
                company.animal_count,
                company.main_animal_type().as_ref(),
            ],
        )?;
        Ok(())
    }

    fn company(&self, key: &CompanyKey) -> Result<Option<CompanyRecord>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE address_id = ? AND description = ?"
        ))?;
        let mut rows = stmt.query(params![key.address_id, key.description])?;
        rows.next()?.map(company_from_row).transpose()
    }

    fn companies_at(&self, address_id: i64) -> Result<Vec<CompanyRecord>, DbError> {
        query_companies(&self.conn(), "WHERE address_id = ?", Some(address_id))
    }

    fn companies(&self) -> Result<Vec<CompanyRecord>, DbError> {
        query_companies(&self.conn(), "", None)
    }

    fn delete_companies_without_description(&self) -> Result<u64, DbError> {
        Ok(self
            .conn()
            .execute("DELETE FROM companies WHERE trim(description) = ''", [])? as u64)
    }
}
