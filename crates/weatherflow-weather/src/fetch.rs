//! Open-Meteo current-conditions client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::instrument;
use url::Url;

use crate::error::{FetchError, ReqwestErrorExt};
use crate::types::{Location, RawWeatherPayload};

pub const OPEN_METEO_BASE: &str = "https://api.open-meteo.com";
const FORECAST_PATH: &str = "v1/forecast";
const USER_AGENT: &str = concat!("weatherflow/", env!("CARGO_PKG_VERSION"));

/// Issues exactly one request per [`fetch`](Self::fetch); retries belong to the driver.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl OpenMeteoClient {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Self::with_base_url(OPEN_METEO_BASE, timeout)
    }

    /// Client against another Open-Meteo compatible host.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Transport)?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `<base>/v1/forecast?latitude=..&longitude=..&current_weather=true`
    pub fn forecast_url(&self, location: &Location) -> Result<Url, FetchError> {
        let mut url = self
            .base_url
            .join(FORECAST_PATH)
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("latitude", &location.latitude.to_string())
            .append_pair("longitude", &location.longitude.to_string())
            .append_pair("current_weather", "true");

        Ok(url)
    }

    /// Fetch the current-conditions payload for `location`.
    ///
    /// Only HTTP 200 counts as success; every other status is returned as
    /// [`FetchError::Status`] with the exact code.
    #[instrument(skip(self, location), fields(location = %location), level = "info")]
    pub async fn fetch(&self, location: &Location) -> Result<RawWeatherPayload, FetchError> {
        let url = self.forecast_url(location)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.into_fetch_error(self.timeout))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!("Weather provider returned status {}", status);
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| e.into_fetch_error(self.timeout))?;

        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::InvalidBody(e.to_string()))?;

        tracing::debug!("Fetched {} byte payload", body.len());
        Ok(RawWeatherPayload::new(value))
    }
}
