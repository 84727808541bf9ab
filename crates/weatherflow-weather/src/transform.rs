//! Flatten a provider payload into a [`WeatherRecord`].

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::types::{Location, RawWeatherPayload, WeatherRecord};

const CURRENT_WEATHER: &str = "current_weather";

/// Extract the current-conditions fields of `payload` and pair them with `location`.
///
/// Pure and deterministic. A missing or `null` field is
/// [`SchemaError::MissingField`]; a value of the wrong JSON type is
/// [`SchemaError::TypeMismatch`]. Nothing is ever defaulted.
pub fn transform(
    payload: &RawWeatherPayload,
    location: &Location,
) -> Result<WeatherRecord, SchemaError> {
    let current = match payload.as_value().get(CURRENT_WEATHER) {
        None | Some(Value::Null) => return Err(SchemaError::missing(CURRENT_WEATHER)),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(SchemaError::type_mismatch(CURRENT_WEATHER, "object")),
    };

    Ok(WeatherRecord {
        latitude: location.latitude,
        longitude: location.longitude,
        temperature: float_field(current, "temperature")?,
        windspeed: float_field(current, "windspeed")?,
        winddirection: float_field(current, "winddirection")?,
        weathercode: integer_field(current, "weathercode")?,
    })
}

fn field<'a>(current: &'a Map<String, Value>, name: &str) -> Result<&'a Value, SchemaError> {
    match current.get(name) {
        None | Some(Value::Null) => Err(SchemaError::missing(path(name))),
        Some(value) => Ok(value),
    }
}

fn float_field(current: &Map<String, Value>, name: &str) -> Result<f64, SchemaError> {
    field(current, name)?
        .as_f64()
        .ok_or_else(|| SchemaError::type_mismatch(path(name), "number"))
}

fn integer_field(current: &Map<String, Value>, name: &str) -> Result<i64, SchemaError> {
    field(current, name)?
        .as_i64()
        .ok_or_else(|| SchemaError::type_mismatch(path(name), "integer"))
}

fn path(name: &str) -> String {
    format!("{}.{}", CURRENT_WEATHER, name)
}
