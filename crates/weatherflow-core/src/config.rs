use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "WEATHERFLOW_CONFIG";

/// Upper bound on `schedule.interval_minutes` (one year).
pub const MAX_INTERVAL_MINUTES: u64 = 366 * 24 * 60;

/// One problem found by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of [`Config::validate`]. Errors refuse startup, warnings are logged.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }

    fn warn(&mut self, field: &'static str, message: impl Into<String>) {
        self.warnings.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }
}

/// Errors only, `; `-separated.
impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Fixed location the pipeline reports on
    pub location: LocationConfig,

    /// Weather provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Destination store
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Run-level retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Trigger settings
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Decimal degrees, north positive
    pub latitude: f64,

    /// Decimal degrees, east positive
    pub longitude: f64,

    /// Display name used in log output only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 51.5074,
            longitude: -0.1278,
            name: Some("London, UK".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the Open-Meteo compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file holding the `weather_data` table
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weatherflow")
        .join("weather.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts after the first failed run
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts, in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub delay_secs: u64,
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_delay_secs() -> u64 {
    300
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_secs: default_retry_delay_secs(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between triggers; 0 runs once and exits
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Identifier carried in logs and alerts
    #[serde(default = "default_pipeline_id")]
    pub pipeline_id: String,
}

fn default_interval_minutes() -> u64 {
    24 * 60
}

fn default_pipeline_id() -> String {
    "weather_etl_pipeline".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            pipeline_id: default_pipeline_id(),
        }
    }
}

impl ScheduleConfig {
    /// Trigger interval, or `None` for a single run
    ///
    /// Values too large for a `Duration` in seconds saturate; `validate`
    /// rejects anything above [`MAX_INTERVAL_MINUTES`] before it gets here.
    pub fn interval(&self) -> Option<Duration> {
        match self.interval_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(minutes.saturating_mul(60))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location: LocationConfig::default(),
            provider: ProviderConfig::default(),
            database: DatabaseConfig::default(),
            retry: RetryConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Writing default configuration to {}", config_path.display());
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Ok(Self::load_from(&config_path)?)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.to_string()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        let lat = self.location.latitude;
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            result.error(
                "location.latitude",
                format!("Latitude must be within [-90, 90], got {}", lat),
            );
        }

        let lon = self.location.longitude;
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            result.error(
                "location.longitude",
                format!("Longitude must be within [-180, 180], got {}", lon),
            );
        }

        self.validate_url(&self.provider.base_url, "provider.base_url", &mut result);

        if self.provider.timeout_secs == 0 {
            result.error("provider.timeout_secs", "Request timeout must be greater than 0");
        } else if self.provider.timeout_secs > 300 {
            result.warn(
                "provider.timeout_secs",
                "Request timeout is unusually long (>5 minutes)",
            );
        }

        if self.database.path.as_os_str().is_empty() {
            result.error("database.path", "Database path must not be empty");
        }

        if self.retry.max_retries > 0 && self.retry.delay_secs == 0 {
            result.warn("retry.delay_secs", "Retries will run back-to-back (0 seconds)");
        }
        if self.retry.max_retries > 10 {
            result.warn("retry.max_retries", "More than 10 retries per run");
        }

        if self.schedule.interval_minutes > MAX_INTERVAL_MINUTES {
            result.error(
                "schedule.interval_minutes",
                format!(
                    "Interval must be at most {} minutes (one year), got {}",
                    MAX_INTERVAL_MINUTES, self.schedule.interval_minutes
                ),
            );
        }

        if self.schedule.pipeline_id.trim().is_empty() {
            result.error("schedule.pipeline_id", "Pipeline id must not be empty");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &'static str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to a file, creating the parent directory
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Path to the configuration file, honouring `WEATHERFLOW_CONFIG`
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("weatherflow");

        Ok(config_dir.join("config.toml"))
    }
}
