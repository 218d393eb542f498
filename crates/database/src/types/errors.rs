//! Error types for the persistence layer.

use thiserror::Error;

/// Errors surfaced by repositories.
///
/// Callers above the store map these into their own taxonomy; only
/// `RowNotFound` carries a semantic meaning, everything else is a store
/// availability problem and safe to retry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("{what} not found: {id}")]
    RowNotFound { what: &'static str, id: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("migration error: {0}")]
    Migration(String),
}

impl StoreError {
    pub fn row_not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::RowNotFound {
            what,
            id: id.into(),
        }
    }

    /// True when the error does not indicate a missing row.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::RowNotFound { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}
