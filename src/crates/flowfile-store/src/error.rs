//! Store error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by graph store backends
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend I/O failure
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be encoded or decoded
    #[error("store serialization error: {0}")]
    Serialization(String),

    /// Backend-specific failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<flowfile_core::FlowError> for StoreError {
    fn from(e: flowfile_core::FlowError) -> Self {
        match e {
            flowfile_core::FlowError::Io(io) => Self::Io(io),
            other => Self::Serialization(other.to_string()),
        }
    }
}
