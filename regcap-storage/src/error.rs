//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The write did not happen; no partial record was left behind
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The query itself is malformed; nothing was read or written
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
