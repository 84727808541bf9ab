//! Destination trait for transformed weather records.

use weatherflow_weather::WeatherRecord;

use crate::error::PersistenceResult;

/// An append-only destination for [`WeatherRecord`]s.
///
/// Schema creation and row insertion are separate idempotent operations, not
/// a joint transaction: a failed insert never takes the table down with it.
pub trait WeatherSink: Send + Sync {
    /// Create the destination table if it does not exist yet.
    ///
    /// Must succeed when called repeatedly against an existing table.
    ///
    /// # Errors
    /// Returns `PersistenceError::Ddl` or `PersistenceError::Connection`.
    fn ensure_schema(&self) -> PersistenceResult<()>;

    /// Append one row with the record's six data columns.
    ///
    /// The row id and timestamp are assigned by the store. Returns the new row id.
    ///
    /// # Errors
    /// Returns `PersistenceError::Insert` or `PersistenceError::Connection`;
    /// no partial row is left behind either way.
    fn insert(&self, record: &WeatherRecord) -> PersistenceResult<i64>;

    /// Ensure the schema, then append `record`.
    fn persist(&self, record: &WeatherRecord) -> PersistenceResult<i64> {
        self.ensure_schema()?;
        self.insert(record)
    }
}

impl<S: WeatherSink + ?Sized> WeatherSink for std::sync::Arc<S> {
    fn ensure_schema(&self) -> PersistenceResult<()> {
        (**self).ensure_schema()
    }

    fn insert(&self, record: &WeatherRecord) -> PersistenceResult<i64> {
        (**self).insert(record)
    }
}
