//! # kinsafe Warehouse
//!
//! DuckDB-backed storage for disaster events discovered by the kinsafe data
//! engine.
//!
//! The warehouse is deliberately narrow: it exposes a lookup by upstream
//! event id and a plain insert. Callers that need "skip if already stored"
//! semantics perform the lookup first; the warehouse never upserts.
//!
//! ```rust,no_run
//! use kinsafe_warehouse::{DisasterRecord, Warehouse};
//!
//! let warehouse = Warehouse::open_default()?;
//! if warehouse.find_event_by_id("us7000abcd")?.is_none() {
//!     // build a DisasterRecord and call `create_event`
//! }
//! # Ok::<(), kinsafe_warehouse::WarehouseError>(())
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `disaster_events` | One row per upstream hazard event id |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Row};
use serde::Serialize;
use thiserror::Error;

pub use crate::duckdb::{DuckDbConnectionManager, PooledConnection};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub kinsafe_home: PathBuf,
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let kinsafe_home = resolve_kinsafe_home();
        let db_path = kinsafe_home.join("data").join("events.duckdb");
        Self {
            kinsafe_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    /// Config rooted at an explicit directory, mostly useful for tests.
    pub fn rooted_at(kinsafe_home: impl Into<PathBuf>) -> Self {
        let kinsafe_home = kinsafe_home.into();
        let db_path = kinsafe_home.join("data").join("events.duckdb");
        Self {
            kinsafe_home,
            db_path,
            max_pool_size: 2,
        }
    }
}

/// Flat, storage-shaped disaster event row.
///
/// Enum-like columns (`category`, `severity`) and timestamps are stored as
/// their canonical string forms; the core crate owns parsing them back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisasterRecord {
    pub id: String,
    pub category: String,
    pub severity: String,
    pub title: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub source: String,
    pub is_active: bool,
    pub magnitude: Option<f64>,
}

impl DisasterRecord {
    fn validate(&self) -> Result<(), WarehouseError> {
        if self.id.trim().is_empty() {
            return Err(WarehouseError::InvalidRecord(String::from(
                "event id cannot be empty",
            )));
        }
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(WarehouseError::InvalidRecord(format!(
                "event '{}' has a non-finite coordinate",
                self.id
            )));
        }
        Ok(())
    }
}

const SELECT_COLUMNS: &str = "id, category, severity, title, description, latitude, longitude, \
radius_km, started_at, ended_at, source, is_active, magnitude";

#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Looks up a stored event by its upstream id.
    pub fn find_event_by_id(&self, id: &str) -> Result<Option<DisasterRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM disaster_events WHERE id = ?");
        let mut statement = connection.prepare(sql.as_str())?;
        let mut rows = statement.query_map(params![id], read_record)?;
        Ok(rows.next().transpose()?)
    }

    /// Inserts a new event. Fails if the id already exists.
    pub fn create_event(&self, record: &DisasterRecord) -> Result<DisasterRecord, WarehouseError> {
        record.validate()?;

        let connection = self.manager.acquire()?;
        connection.execute(
            r#"
INSERT INTO disaster_events (
    id, category, severity, title, description, latitude, longitude,
    radius_km, started_at, ended_at, source, is_active, magnitude
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#,
            params![
                record.id,
                record.category,
                record.severity,
                record.title,
                record.description,
                record.latitude,
                record.longitude,
                record.radius_km,
                record.started_at,
                record.ended_at,
                record.source,
                record.is_active,
                record.magnitude,
            ],
        )?;

        Ok(record.clone())
    }

    /// Most recently started events first.
    pub fn list_events(&self, limit: usize) -> Result<Vec<DisasterRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM disaster_events ORDER BY started_at DESC, id LIMIT ?"
        );
        let mut statement = connection.prepare(sql.as_str())?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = statement.query_map(params![limit], read_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(WarehouseError::from)
    }

    pub fn count_events(&self) -> Result<u64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM disaster_events", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn read_record(row: &Row<'_>) -> Result<DisasterRecord, ::duckdb::Error> {
    Ok(DisasterRecord {
        id: row.get(0)?,
        category: row.get(1)?,
        severity: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        radius_km: row.get(7)?,
        started_at: row.get(8)?,
        ended_at: row.get(9)?,
        source: row.get(10)?,
        is_active: row.get(11)?,
        magnitude: row.get(12)?,
    })
}

fn resolve_kinsafe_home() -> PathBuf {
    if let Some(path) = env::var_os("KINSAFE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".kinsafe");
    }

    PathBuf::from(".kinsafe")
}
