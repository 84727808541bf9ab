//! SQLite-backed weather store.
//!
//! `SqliteWeatherStore` appends one row per pipeline run to `weather_data`.
//! Rows are never updated or deleted here.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use weatherflow_weather::WeatherRecord;

use crate::error::{PersistenceError, PersistenceResult, RusqliteErrorExt, Statement};
use crate::sink::WeatherSink;

/// How long a writer waits on another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS weather_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        latitude REAL,
        longitude REAL,
        temperature REAL,
        windspeed REAL,
        winddirection REAL,
        weathercode INTEGER,
        timestamp TEXT DEFAULT CURRENT_TIMESTAMP
    );
"#;

const INSERT_ROW: &str = "INSERT INTO weather_data \
     (latitude, longitude, temperature, windspeed, winddirection, weathercode) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// `CURRENT_TIMESTAMP` format, always UTC.
const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// A row read back from `weather_data`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWeatherRow {
    pub id: i64,
    pub record: WeatherRecord,
    pub timestamp: DateTime<Utc>,
}

/// SQLite weather store.
pub struct SqliteWeatherStore {
    conn: Mutex<Connection>,
}

impl SqliteWeatherStore {
    /// Open (or create) the database file at `path`.
    ///
    /// The table itself is created lazily by [`WeatherSink::ensure_schema`].
    pub fn open<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PersistenceError::Connection(format!("{}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| e.into_persistence_error(Statement::Open))?;
        Self::from_connection(conn)
    }

    /// In-memory store, gone when dropped.
    pub fn in_memory() -> PersistenceResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| e.into_persistence_error(Statement::Open))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> PersistenceResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| e.into_persistence_error(Statement::Open))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored rows.
    pub fn count(&self) -> PersistenceResult<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM weather_data", [], |row| row.get(0))
            .map_err(|e| e.into_persistence_error(Statement::Query))?;
        Ok(count as usize)
    }

    /// The newest `limit` rows, newest first.
    pub fn recent(&self, limit: usize) -> PersistenceResult<Vec<StoredWeatherRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, latitude, longitude, temperature, windspeed, winddirection, weathercode, timestamp
                 FROM weather_data
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .map_err(|e| e.into_persistence_error(Statement::Query))?;

        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], Self::row_to_stored)
            .map_err(|e| e.into_persistence_error(Statement::Query))?;

        let raw = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.into_persistence_error(Statement::Query))?;

        raw.into_iter()
            .map(|(id, record, timestamp)| -> PersistenceResult<StoredWeatherRow> {
                let timestamp = NaiveDateTime::parse_from_str(&timestamp, SQLITE_TIMESTAMP)
                    .map_err(|e| {
                        PersistenceError::Query(format!("row {}: bad timestamp {:?}: {}", id, timestamp, e))
                    })?
                    .and_utc();
                Ok(StoredWeatherRow {
                    id,
                    record,
                    timestamp,
                })
            })
            .collect()
    }

    fn row_to_stored(row: &rusqlite::Row) -> rusqlite::Result<(i64, WeatherRecord, String)> {
        let record = WeatherRecord {
            latitude: row.get(1)?,
            longitude: row.get(2)?,
            temperature: row.get(3)?,
            windspeed: row.get(4)?,
            winddirection: row.get(5)?,
            weathercode: row.get(6)?,
        };
        Ok((row.get(0)?, record, row.get(7)?))
    }
}

impl WeatherSink for SqliteWeatherStore {
    fn ensure_schema(&self) -> PersistenceResult<()> {
        self.conn
            .lock()
            .execute_batch(CREATE_TABLE)
            .map_err(|e| e.into_persistence_error(Statement::Ddl))
    }

    fn insert(&self, record: &WeatherRecord) -> PersistenceResult<i64> {
        let conn = self.conn.lock();
        conn.execute(
            INSERT_ROW,
            params![
                record.latitude,
                record.longitude,
                record.temperature,
                record.windspeed,
                record.winddirection,
                record.weathercode,
            ],
        )
        .map_err(|e| e.into_persistence_error(Statement::Insert))?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Inserted weather_data row {}", id);
        Ok(id)
    }
}
