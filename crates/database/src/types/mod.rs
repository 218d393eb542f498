//! Shared types and result types for the database layer

pub mod errors;

pub use errors::StoreError;

/// Common result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
