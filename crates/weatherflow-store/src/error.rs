use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors from the destination store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The database could not be opened, or stayed busy/locked past the timeout.
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Failed to create weather_data table: {0}")]
    Ddl(String),

    #[error("Failed to insert weather record: {0}")]
    Insert(String),

    #[error("Query failed: {0}")]
    Query(String),
}

impl PersistenceError {
    /// Only connection-level failures can clear up on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Unable to open the weather database. The run will be retried.",
            Self::Ddl(_) => "The weather_data table could not be created. Check the database.",
            Self::Insert(_) => "The weather reading could not be stored.",
            Self::Query(_) => "Reading from the weather database failed.",
        }
    }
}

/// Result type for store operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Which statement was running when rusqlite failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Statement {
    Open,
    Ddl,
    Insert,
    Query,
}

/// Extension trait for converting rusqlite errors to [`PersistenceError`].
pub(crate) trait RusqliteErrorExt {
    fn into_persistence_error(self, statement: Statement) -> PersistenceError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_persistence_error(self, statement: Statement) -> PersistenceError {
        let connection_level = matches!(
            &self,
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                        | ErrorCode::CannotOpen
                        | ErrorCode::NotADatabase
                        | ErrorCode::PermissionDenied
                        | ErrorCode::ReadOnly
                )
        );

        if connection_level || statement == Statement::Open {
            return PersistenceError::Connection(self.to_string());
        }

        match statement {
            Statement::Ddl => PersistenceError::Ddl(self.to_string()),
            Statement::Insert => PersistenceError::Insert(self.to_string()),
            Statement::Open | Statement::Query => PersistenceError::Query(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: ErrorCode) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code,
                extended_code: 0,
            },
            None,
        )
    }

    #[test]
    fn test_busy_is_connection_error() {
        let err = failure(ErrorCode::DatabaseBusy).into_persistence_error(Statement::Insert);
        assert!(matches!(err, PersistenceError::Connection(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_constraint_violation_is_insert_error() {
        let err = failure(ErrorCode::ConstraintViolation).into_persistence_error(Statement::Insert);
        assert!(matches!(err, PersistenceError::Insert(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_ddl_failure() {
        let err = failure(ErrorCode::Unknown).into_persistence_error(Statement::Ddl);
        assert!(matches!(err, PersistenceError::Ddl(_)));
    }

    #[test]
    fn test_open_failure_is_connection_error() {
        let err = rusqlite::Error::InvalidQuery.into_persistence_error(Statement::Open);
        assert!(matches!(err, PersistenceError::Connection(_)));
    }
}
