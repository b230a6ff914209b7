//! SQLite store for the finished hierarchy.
//!
//! Tables are replaced wholesale on every run inside a single transaction,
//! so readers see either the previous run or the new one, never a mix.

mod lookup;

pub use lookup::{GiniLookup, LookupMode, QueryExpr, Scope};

use std::fmt;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params, Connection};
use serde::Serialize;
use thiserror::Error;

use crate::models::{CountryRecord, DistrictRecord, Hierarchy, RegionRecord};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS Countries (
    country_id INTEGER PRIMARY KEY,
    country_name TEXT NOT NULL,
    gini_index REAL
);
CREATE TABLE IF NOT EXISTS Districts (
    district_id INTEGER PRIMARY KEY,
    country_id INTEGER NOT NULL REFERENCES Countries(country_id),
    district_name TEXT NOT NULL,
    gini_index REAL
);
CREATE TABLE IF NOT EXISTS Regions (
    region_id INTEGER PRIMARY KEY,
    district_id INTEGER NOT NULL REFERENCES Districts(district_id),
    region_name TEXT NOT NULL,
    gini_index REAL
);
CREATE INDEX IF NOT EXISTS idx_countries_name ON Countries(country_name);
CREATE INDEX IF NOT EXISTS idx_districts_name ON Districts(district_name);
CREATE INDEX IF NOT EXISTS idx_districts_country ON Districts(country_id);
CREATE INDEX IF NOT EXISTS idx_regions_name ON Regions(region_name);
CREATE INDEX IF NOT EXISTS idx_regions_district ON Regions(district_id);
"#;

/// Errors raised by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid lookup: {0}")]
    InvalidLookup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single cell of a raw query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Integer(i),
            Value::Real(f) => SqlValue::Real(f),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Blob(b),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Result of a raw query: column names plus rows of cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// One `(name, gini_index)` pair returned by a lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GiniRow {
    pub name: String,
    pub gini: Option<f64>,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub countries: u64,
    pub districts: u64,
    pub regions: u64,
}

/// SQLite-backed hierarchy store.
pub struct GiniStore {
    conn: Connection,
}

impl GiniStore {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Create the tables if they don't exist.
    pub fn create_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Replace the contents of all three tables.
    ///
    /// Runs in one transaction: on any failure the previous contents stay.
    pub fn replace_all(&mut self, hierarchy: &Hierarchy) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM Regions", [])?;
        tx.execute("DELETE FROM Districts", [])?;
        tx.execute("DELETE FROM Countries", [])?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO Countries (country_id, country_name, gini_index) VALUES (?1, ?2, ?3)",
            )?;
            for c in &hierarchy.countries {
                insert.execute(params![c.country_id, c.country_name, c.gini_index])?;
            }

            let mut insert = tx.prepare(
                "INSERT INTO Districts (district_id, country_id, district_name, gini_index) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for d in &hierarchy.districts {
                insert.execute(params![
                    d.district_id,
                    d.country_id,
                    d.district_name,
                    d.gini_index
                ])?;
            }

            let mut insert = tx.prepare(
                "INSERT INTO Regions (region_id, district_id, region_name, gini_index) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for r in &hierarchy.regions {
                insert.execute(params![r.region_id, r.district_id, r.region_name, r.gini_index])?;
            }
        }

        tx.commit()?;
        tracing::info!(
            "Stored {} countries, {} districts, {} regions",
            hierarchy.countries.len(),
            hierarchy.districts.len(),
            hierarchy.regions.len()
        );
        Ok(())
    }

    /// Execute arbitrary SQL and return its rows.
    pub fn raw_query(&self, sql: &str) -> Result<QueryRows, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut result = QueryRows {
            rows: Vec::new(),
            columns,
        };
        let width = result.columns.len();

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(SqlValue::from(row.get::<_, Value>(i)?));
            }
            result.rows.push(cells);
        }

        Ok(result)
    }

    /// Resolve a structured Gini lookup.
    pub fn gini_lookup(&self, lookup: &GiniLookup) -> Result<Vec<GiniRow>, StoreError> {
        let mut stmt = self.conn.prepare(lookup.sql())?;
        let rows = stmt
            .query_map([lookup.name()], |row| {
                Ok(GiniRow {
                    name: row.get(0)?,
                    gini: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Row counts of the three tables.
    pub fn counts(&self) -> Result<TableCounts, StoreError> {
        let count = |table: &str| -> Result<u64, StoreError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(TableCounts {
            countries: count("Countries")?,
            districts: count("Districts")?,
            regions: count("Regions")?,
        })
    }

    /// Read the stored tables back, ordered by id.
    pub fn load_hierarchy(&self) -> Result<Hierarchy, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT country_id, country_name, gini_index FROM Countries ORDER BY country_id",
        )?;
        let countries = stmt
            .query_map([], |row| {
                Ok(CountryRecord {
                    country_id: row.get(0)?,
                    country_name: row.get(1)?,
                    gini_index: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT district_id, country_id, district_name, gini_index FROM Districts \
             ORDER BY district_id",
        )?;
        let districts = stmt
            .query_map([], |row| {
                Ok(DistrictRecord {
                    district_id: row.get(0)?,
                    country_id: row.get(1)?,
                    district_name: row.get(2)?,
                    gini_index: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT region_id, district_id, region_name, gini_index FROM Regions \
             ORDER BY region_id",
        )?;
        let regions = stmt
            .query_map([], |row| {
                Ok(RegionRecord {
                    region_id: row.get(0)?,
                    district_id: row.get(1)?,
                    region_name: row.get(2)?,
                    gini_index: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Hierarchy {
            countries,
            districts,
            regions,
        })
    }
}
