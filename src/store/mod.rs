//! Durable vessel storage backed by SQLite.
//!
//! One row per MMSI holds the latest known state; an append-only
//! `position_history` table holds trajectory samples. Enumerated fields
//! (ship type, navigational status) are stored as their numeric codes and
//! reconstructed on read.

use crate::vessel::{Vessel, TANKER_TYPES};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

mod async_store;
#[cfg(test)]
mod tests;

pub use async_store::AsyncVesselStore;

/// Durable-store row counts reported through `statistics()`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub total_vessels: u64,
    pub tankers: u64,
    pub with_position: u64,
    pub history_samples: u64,
}

/// Blocking SQLite store for vessel state.
///
/// # Thread Safety
/// The connection is wrapped in a Mutex; SQLite's serialized mode plus the
/// lock make concurrent callers safe at the cost of serializing writes.
/// Callers on an async hot path should use [`AsyncVesselStore`] instead.
pub struct VesselStore {
    conn: Mutex<Connection>,
}

impl VesselStore {
    /// Open or create the store at `db_path`. Use `":memory:"` for tests.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
            }
        }

        let conn = Connection::open(&db_path).context("Failed to open vessel database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS vessels (
                mmsi INTEGER PRIMARY KEY,

                lat REAL,
                lon REAL,
                speed REAL,
                course REAL,
                heading INTEGER,
                rot REAL,
                navigational_status INTEGER,
                position_accuracy INTEGER,

                name TEXT,
                imo INTEGER,
                callsign TEXT,
                ship_type INTEGER,

                length REAL,
                width REAL,
                draught REAL,
                dimension_to_bow INTEGER,
                dimension_to_stern INTEGER,
                dimension_to_port INTEGER,
                dimension_to_starboard INTEGER,

                destination TEXT,
                eta TEXT,
                cargo TEXT,
                deadweight INTEGER,
                gross_tonnage INTEGER,

                last_update TEXT,
                first_seen TEXT,
                update_count INTEGER NOT NULL DEFAULT 0,

                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create vessels table")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS position_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mmsi INTEGER NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                speed REAL,
                course REAL,
                heading INTEGER,
                recorded_at TEXT NOT NULL,
                region TEXT
            )
            "#,
            [],
        )
        .context("Failed to create position_history table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_ship_type ON vessels(ship_type)",
            [],
        )
        .context("Failed to create ship_type index")?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_last_update ON vessels(last_update)",
            [],
        )
        .context("Failed to create last_update index")?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_mmsi ON position_history(mmsi)",
            [],
        )
        .context("Failed to create history index")?;

        // Columns added after the initial schema shipped
        Self::add_column_if_missing(&conn, "vessels", "region TEXT")?;

        info!("Vessel database ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Additive, idempotent schema migration. The store's lifetime spans
    /// process upgrades, so a column that already exists is tolerated
    /// silently rather than treated as fatal.
    fn add_column_if_missing(conn: &Connection, table: &str, column_def: &str) -> Result<()> {
        let sql = format!("ALTER TABLE {table} ADD COLUMN {column_def}");
        match conn.execute(&sql, []) {
            Ok(_) => {
                info!(table, column = column_def, "Added column");
                Ok(())
            }
            Err(e) if e.to_string().contains("duplicate column name") => {
                debug!(table, column = column_def, "Column already present");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to add column to {table}")),
        }
    }

    /// Upsert the vessel's latest state by MMSI.
    ///
    /// The denormalized `region` column is deliberately left untouched here;
    /// it is maintained through [`VesselStore::update_region`].
    pub fn save(&self, vessel: &Vessel) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        Self::save_with(&conn, vessel)
    }

    fn save_with(conn: &Connection, vessel: &Vessel) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO vessels (
                mmsi, lat, lon, speed, course, heading, rot,
                navigational_status, position_accuracy,
                name, imo, callsign, ship_type,
                length, width, draught,
                dimension_to_bow, dimension_to_stern,
                dimension_to_port, dimension_to_starboard,
                destination, eta, cargo, deadweight, gross_tonnage,
                last_update, first_seen, update_count, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)
            ON CONFLICT(mmsi) DO UPDATE SET
                lat = excluded.lat,
                lon = excluded.lon,
                speed = excluded.speed,
                course = excluded.course,
                heading = excluded.heading,
                rot = excluded.rot,
                navigational_status = excluded.navigational_status,
                position_accuracy = excluded.position_accuracy,
                name = excluded.name,
                imo = excluded.imo,
                callsign = excluded.callsign,
                ship_type = excluded.ship_type,
                length = excluded.length,
                width = excluded.width,
                draught = excluded.draught,
                dimension_to_bow = excluded.dimension_to_bow,
                dimension_to_stern = excluded.dimension_to_stern,
                dimension_to_port = excluded.dimension_to_port,
                dimension_to_starboard = excluded.dimension_to_starboard,
                destination = excluded.destination,
                eta = excluded.eta,
                cargo = excluded.cargo,
                deadweight = excluded.deadweight,
                gross_tonnage = excluded.gross_tonnage,
                last_update = excluded.last_update,
                first_seen = excluded.first_seen,
                update_count = excluded.update_count,
                updated_at = excluded.updated_at
            "#,
            params![
                vessel.mmsi,
                vessel.lat,
                vessel.lon,
                vessel.speed,
                vessel.course,
                vessel.heading,
                vessel.rot,
                vessel.navigational_status,
                vessel.position_accuracy.map(i64::from),
                vessel.name,
                vessel.imo,
                vessel.callsign,
                vessel.ship_type,
                vessel.length,
                vessel.width,
                vessel.draught,
                vessel.dimension_to_bow,
                vessel.dimension_to_stern,
                vessel.dimension_to_port,
                vessel.dimension_to_starboard,
                vessel.destination,
                vessel.eta,
                vessel.cargo,
                vessel.deadweight,
                vessel.gross_tonnage,
                vessel.last_update.map(|t| t.to_rfc3339()),
                vessel.first_seen.map(|t| t.to_rfc3339()),
                vessel.update_count,
                Utc::now().to_rfc3339(),
            ],
        )
        .with_context(|| format!("Failed to save vessel {}", vessel.mmsi))?;

        Ok(())
    }

    /// Upsert a batch inside a single transaction.
    ///
    /// The batch commits together; an individual row failure is logged and
    /// skipped so one bad record cannot sink a shutdown flush.
    pub fn bulk_save<'a, I>(&self, vessels: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Vessel>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().context("Failed to begin transaction")?;

        let mut saved = 0;
        for vessel in vessels {
            match Self::save_with(&tx, vessel) {
                Ok(()) => saved += 1,
                Err(e) => warn!(mmsi = vessel.mmsi, error = %e, "Skipping vessel in bulk save"),
            }
        }

        tx.commit().context("Failed to commit bulk save")?;
        debug!(saved, "Bulk saved vessels");
        Ok(saved)
    }

    /// Fetch the latest state for one MMSI.
    pub fn get(&self, mmsi: u32) -> Result<Option<Vessel>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM vessels WHERE mmsi = ?1")
            .context("Failed to prepare query")?;

        let mut rows = stmt.query(params![mmsi]).context("Failed to query vessel")?;
        match rows.next().context("Failed to read row")? {
            Some(row) => Ok(Some(row_to_vessel(row).context("Failed to decode row")?)),
            None => Ok(None),
        }
    }

    /// All vessels, most-recently-updated first, so cache rehydration favors
    /// currently-relevant vessels during partial replays.
    pub fn get_all(&self) -> Result<Vec<Vessel>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM vessels ORDER BY last_update DESC")
            .context("Failed to prepare query")?;

        let vessels = stmt
            .query_map([], row_to_vessel)
            .context("Failed to query vessels")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read rows")?;

        Ok(vessels)
    }

    /// Vessels whose ship-type code is in `type_codes`.
    pub fn get_by_type(&self, type_codes: &[u16]) -> Result<Vec<Vessel>> {
        if type_codes.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().unwrap();
        let placeholders = vec!["?"; type_codes.len()].join(",");
        let sql = format!(
            "SELECT * FROM vessels WHERE ship_type IN ({placeholders}) ORDER BY last_update DESC"
        );
        let mut stmt = conn.prepare(&sql).context("Failed to prepare query")?;

        let vessels = stmt
            .query_map(rusqlite::params_from_iter(type_codes.iter()), row_to_vessel)
            .context("Failed to query vessels by type")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read rows")?;

        Ok(vessels)
    }

    /// Append one trajectory sample. Insert-only; existing rows are never
    /// updated or deleted.
    #[allow(clippy::too_many_arguments)]
    pub fn append_history(
        &self,
        mmsi: u32,
        lat: f64,
        lon: f64,
        speed: Option<f64>,
        course: Option<f64>,
        heading: Option<u16>,
        recorded_at: DateTime<Utc>,
        region: Option<&str>,
    ) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO position_history
                    (mmsi, lat, lon, speed, course, heading, recorded_at, region)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    mmsi,
                    lat,
                    lon,
                    speed,
                    course,
                    heading,
                    recorded_at.to_rfc3339(),
                    region
                ],
            )
            .with_context(|| format!("Failed to append history for {mmsi}"))?;

        Ok(())
    }

    /// Trajectory samples for one vessel, oldest first.
    pub fn history(&self, mmsi: u32, limit: u32) -> Result<Vec<HistorySample>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT mmsi, lat, lon, speed, course, heading, recorded_at, region
                FROM position_history WHERE mmsi = ?1
                ORDER BY id ASC LIMIT ?2
                "#,
            )
            .context("Failed to prepare history query")?;

        let samples = stmt
            .query_map(params![mmsi, limit], |row| {
                let recorded_at: String = row.get(6)?;
                Ok(HistorySample {
                    mmsi: row.get(0)?,
                    lat: row.get(1)?,
                    lon: row.get(2)?,
                    speed: row.get(3)?,
                    course: row.get(4)?,
                    heading: row.get(5)?,
                    recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_default(),
                    region: row.get(7)?,
                })
            })
            .context("Failed to query history")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read history rows")?;

        Ok(samples)
    }

    /// Set the denormalized region column for fast region-scoped reads.
    pub fn update_region(&self, mmsi: u32, region: Option<&str>) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE vessels SET region = ?2 WHERE mmsi = ?1",
                params![mmsi, region],
            )
            .with_context(|| format!("Failed to update region for {mmsi}"))?;

        Ok(())
    }

    /// Durable row counts.
    pub fn statistics(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().unwrap();

        let total_vessels: u64 = conn
            .query_row("SELECT COUNT(*) FROM vessels", [], |row| row.get(0))
            .context("Failed to count vessels")?;
        let tankers: u64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vessels WHERE ship_type BETWEEN ?1 AND ?2",
                params![*TANKER_TYPES.start(), *TANKER_TYPES.end()],
                |row| row.get(0),
            )
            .context("Failed to count tankers")?;
        let with_position: u64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vessels WHERE lat IS NOT NULL AND lon IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .context("Failed to count positioned vessels")?;
        let history_samples: u64 = conn
            .query_row("SELECT COUNT(*) FROM position_history", [], |row| row.get(0))
            .context("Failed to count history samples")?;

        Ok(StoreStats {
            total_vessels,
            tankers,
            with_position,
            history_samples,
        })
    }
}

/// One row of the append-only trajectory log.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySample {
    pub mmsi: u32,
    pub lat: f64,
    pub lon: f64,
    pub speed: Option<f64>,
    pub course: Option<f64>,
    pub heading: Option<u16>,
    pub recorded_at: DateTime<Utc>,
    pub region: Option<String>,
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn row_to_vessel(row: &Row<'_>) -> rusqlite::Result<Vessel> {
    let position_accuracy: Option<i64> = row.get("position_accuracy")?;
    let last_update: Option<String> = row.get("last_update")?;
    let first_seen: Option<String> = row.get("first_seen")?;

    Ok(Vessel {
        mmsi: row.get("mmsi")?,
        lat: row.get("lat")?,
        lon: row.get("lon")?,
        speed: row.get("speed")?,
        course: row.get("course")?,
        heading: row.get("heading")?,
        rot: row.get("rot")?,
        navigational_status: row.get("navigational_status")?,
        position_accuracy: position_accuracy.map(|v| v != 0),
        name: row.get("name")?,
        imo: row.get("imo")?,
        callsign: row.get("callsign")?,
        ship_type: row.get("ship_type")?,
        length: row.get("length")?,
        width: row.get("width")?,
        draught: row.get("draught")?,
        dimension_to_bow: row.get("dimension_to_bow")?,
        dimension_to_stern: row.get("dimension_to_stern")?,
        dimension_to_port: row.get("dimension_to_port")?,
        dimension_to_starboard: row.get("dimension_to_starboard")?,
        destination: row.get("destination")?,
        eta: row.get("eta")?,
        cargo: row.get("cargo")?,
        deadweight: row.get("deadweight")?,
        gross_tonnage: row.get("gross_tonnage")?,
        last_update: parse_timestamp(last_update),
        first_seen: parse_timestamp(first_seen),
        update_count: row.get("update_count")?,
    })
}
