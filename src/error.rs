use thiserror::Error;

use crate::types::ValueError;

/// Failure reported by a driver collaborator.
///
/// Backend errors are kept intact so callers can still downcast through
/// [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum DriverError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    pub fn other(message: impl Into<String>) -> Self {
        DriverError::Other(message.into())
    }
}

#[derive(Debug, Error)]
pub enum SimpleDbError {
    #[error("Connection error: cannot open {target}")]
    ConnectionError {
        target: String,
        #[source]
        source: DriverError,
    },

    #[error("Transaction error: {operation} failed")]
    TransactionError {
        operation: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("SQL execution error: {sql}")]
    ExecutionError {
        sql: String,
        #[source]
        source: DriverError,
    },

    #[error("Mapping error: cannot assign column `{column}` of {target}")]
    MappingError {
        target: &'static str,
        column: String,
        #[source]
        source: ValueError,
    },

    #[error("State error: {0}")]
    StateError(String),

    #[error("Close error: connection did not close cleanly")]
    CloseError(#[source] DriverError),

    #[error("IN-list error: `{fragment}` {reason}")]
    InListError { fragment: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SimpleDbError {
    pub(crate) fn transaction(operation: &'static str, source: DriverError) -> Self {
        SimpleDbError::TransactionError { operation, source }
    }

    pub(crate) fn execution(sql: impl Into<String>, source: impl Into<DriverError>) -> Self {
        SimpleDbError::ExecutionError {
            sql: sql.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimpleDbError>;
