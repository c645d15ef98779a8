//! Common error types for cadenza

use thiserror::Error;

/// Common result type for cadenza operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across cadenza services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors caused by a unique constraint violation in the store.
    ///
    /// The resolver uses this to convert a losing concurrent insert into a
    /// re-lookup instead of propagating the failure.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("2067")
                    || db_err.message().contains("UNIQUE constraint failed")
            }
            _ => false,
        }
    }

    /// True for SQLITE_BUSY-class errors from a concurrent writer.
    ///
    /// A write upgrade under WAL can fail with this before any
    /// constraint is checked; callers re-run the whole transaction.
    pub fn is_database_locked(&self) -> bool {
        match self {
            Error::Database(err) => err.to_string().contains("database is locked"),
            _ => false,
        }
    }
}
