//! Error types for the storage layer.

use launchpad_license::LicenseError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Database error from MySQL.
    #[error("mysql error: {0}")]
    MySql(#[from] sqlx::Error),

    /// Expected tables are absent.
    #[error("required tables not found: {}", .0.join(", "))]
    MissingTables(Vec<String>),

    /// The startup gate gave up on the store.
    #[error("store unreachable after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Returns true if a uniqueness constraint rejected the write.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StorageError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ),
            StorageError::MySql(sqlx::Error::Database(err)) => err.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<StorageError> for LicenseError {
    fn from(err: StorageError) -> Self {
        if err.is_unique_violation() {
            LicenseError::Duplicate(err.to_string())
        } else {
            LicenseError::Storage(err.to_string())
        }
    }
}
