//! Error types for flashstore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::store::Status;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for flashstore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    NotFound,

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Storage full: need {needed} bytes, {available} available")]
    Full { needed: usize, available: usize },

    #[error("Item over length: {what} is {len} bytes, limit is {limit}")]
    OverLength {
        what: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("Sweep required: {dead} bytes held by dead records")]
    SweepRequired { dead: usize },

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    // -------------------------------------------------------------------------
    // Flash Errors
    // -------------------------------------------------------------------------
    #[error("Hardware fault: {0}")]
    HardwareFatal(String),

    #[error("Session error: {0}")]
    Session(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Map this error onto the status code returned at the runtime boundary
    pub fn status(&self) -> Status {
        match self {
            StoreError::Full { .. } => Status::Full,
            StoreError::OverLength { .. } => Status::OverLength,
            StoreError::SweepRequired { .. } => Status::SweepRequired,
            StoreError::HardwareFatal(_) => Status::Fatal,
            _ => Status::Error,
        }
    }

    /// Whether this is a missing key / out of range index
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
