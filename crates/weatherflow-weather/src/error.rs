//! Errors raised by the extract and transform stages.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// The provider request did not yield a usable payload.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Weather provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("Weather request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection to weather provider failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("Weather request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Weather provider returned an invalid body: {0}")]
    InvalidBody(String),

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// The HTTP status carried by a non-200 response, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status } => Some(*status),
            _ => None,
        }
    }

    /// Whether a fresh run may succeed where this one failed.
    ///
    /// Timeouts, refused connections, 5xx, 408 and 429 are transient;
    /// other client errors and malformed bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connect(_) => true,
            Self::Status { status } => match StatusCode::from_u16(*status) {
                Ok(code) => {
                    code.is_server_error()
                        || code == StatusCode::TOO_MANY_REQUESTS
                        || code == StatusCode::REQUEST_TIMEOUT
                }
                Err(_) => false,
            },
            Self::Transport(_) | Self::InvalidBody(_) | Self::InvalidUrl(_) => false,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Status { status } if *status >= 500 => {
                "The weather service is experiencing issues. The run will be retried."
            }
            Self::Status { .. } => "The weather service rejected the request.",
            Self::Timeout(_) => "The weather service did not answer in time.",
            Self::Connect(_) => "Unable to reach the weather service. Check connectivity.",
            Self::Transport(_) => "The weather request failed.",
            Self::InvalidBody(_) => "The weather service returned an unreadable response.",
            Self::InvalidUrl(_) => "The weather provider URL is invalid. Check settings.",
        }
    }
}

/// Classifies transport failures into [`FetchError`] variants.
pub trait ReqwestErrorExt {
    fn into_fetch_error(self, timeout: Duration) -> FetchError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_fetch_error(self, timeout: Duration) -> FetchError {
        if self.is_timeout() {
            FetchError::Timeout(timeout)
        } else if self.is_connect() {
            FetchError::Connect(self)
        } else if let Some(status) = self.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport(self)
        }
    }
}

/// The payload did not have the shape of a current-conditions response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Field {field} has the wrong type (expected {expected})")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
}

impl SchemaError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn type_mismatch(field: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
        }
    }

    /// Dotted path of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field } | Self::TypeMismatch { field, .. } => field,
        }
    }

    pub fn user_message(&self) -> &'static str {
        "The weather service response changed shape. The record was not stored."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        for status in [500, 502, 503, 504] {
            assert!(FetchError::Status { status }.is_retryable(), "{status}");
        }
        assert!(FetchError::Status { status: 429 }.is_retryable());
        assert!(FetchError::Status { status: 408 }.is_retryable());
        assert!(FetchError::Timeout(Duration::from_secs(10)).is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        for status in [400, 401, 403, 404] {
            assert!(!FetchError::Status { status }.is_retryable(), "{status}");
        }
        assert!(!FetchError::InvalidBody("eof".into()).is_retryable());
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(FetchError::Status { status: 503 }.status(), Some(503));
        assert_eq!(FetchError::InvalidBody("x".into()).status(), None);
    }

    #[test]
    fn test_schema_error_field() {
        let err = SchemaError::missing("current_weather.windspeed");
        assert_eq!(err.field(), "current_weather.windspeed");
        assert!(err.to_string().contains("current_weather.windspeed"));

        let err = SchemaError::type_mismatch("current_weather.weathercode", "integer");
        assert_eq!(err.field(), "current_weather.weathercode");
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn test_user_message_mentions_retry_for_outages() {
        assert!(FetchError::Status { status: 503 }.user_message().contains("retried"));
        assert!(!FetchError::Status { status: 404 }.user_message().contains("retried"));
    }
}
