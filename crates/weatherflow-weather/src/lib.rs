//! Extract and transform stages of the weather pipeline.
//!
//! [`OpenMeteoClient`] pulls the current-conditions payload from Open-Meteo;
//! [`transform`] flattens it into a [`WeatherRecord`] for the store.

pub mod error;
pub mod fetch;
pub mod transform;
pub mod types;

pub use error::{FetchError, SchemaError};
pub use fetch::OpenMeteoClient;
pub use transform::transform;
pub use types::*;
