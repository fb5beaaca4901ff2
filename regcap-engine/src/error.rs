//! Engine error types

use regcap_compiler::CompilerError;
use regcap_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed transaction or rule definition; no state was changed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Engine missing, misconfigured or never loaded
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => EngineError::Validation(msg),
            CoreError::Serialization(e) => EngineError::Serialization(e),
        }
    }
}

impl From<CompilerError> for EngineError {
    fn from(err: CompilerError) -> Self {
        EngineError::Validation(err.to_string())
    }
}
