//! Append-only persistence for weather readings.

pub mod error;
pub mod sink;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use sink::WeatherSink;
pub use sqlite::{SqliteWeatherStore, StoredWeatherRow};
