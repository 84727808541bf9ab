use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed geographic location in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Provider response body, kept exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawWeatherPayload(Value);

impl RawWeatherPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for RawWeatherPayload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One flattened current-conditions reading, as written to `weather_data`.
///
/// The row id and timestamp are assigned by the store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f64,
    pub windspeed: f64,
    pub winddirection: f64,
    pub weathercode: i64,
}

impl WeatherRecord {
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }

    /// Short label for `weathercode`, used in run logs.
    pub fn condition(&self) -> &'static str {
        wmo_label(self.weathercode)
    }
}

/// WMO 4677 present-weather groups as reported by Open-Meteo.
fn wmo_label(code: i64) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51..=57 => "drizzle",
        61..=67 => "rain",
        71..=77 => "snow",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95..=99 => "thunderstorm",
        _ => "unrecognised weather code",
    }
}
