use thiserror::Error;
use weatherflow_store::PersistenceError;
use weatherflow_weather::{FetchError, SchemaError};

use crate::run::RunState;

/// Why a run ended in [`RunState::Failed`].
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Transform failed: {0}")]
    Schema(#[from] SchemaError),

    #[error("Persist failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Run cancelled")]
    Cancelled,
}

impl RunError {
    /// Whether re-running the whole pipeline could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::Schema(_) => false,
            Self::Persistence(e) => e.is_retryable(),
            Self::Cancelled => false,
        }
    }

    /// The stage that raised the error.
    pub fn stage(&self) -> Option<RunState> {
        match self {
            Self::Fetch(_) => Some(RunState::Fetching),
            Self::Schema(_) => Some(RunState::Transforming),
            Self::Persistence(_) => Some(RunState::Persisting),
            Self::Cancelled => None,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Fetch(e) => e.user_message(),
            Self::Schema(e) => e.user_message(),
            Self::Persistence(e) => e.user_message(),
            Self::Cancelled => "The run was cancelled before it finished. Nothing was stored.",
        }
    }
}
