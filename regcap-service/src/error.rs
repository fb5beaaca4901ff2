//! Service error taxonomy

use regcap_compiler::CompilerError;
use regcap_core::CoreError;
use regcap_engine::EngineError;
use regcap_risk::RiskError;
use regcap_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed transaction, event envelope or rule definition
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Calculation error: {0}")]
    Calculation(String),

    /// The decision was not recorded
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Policy engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Calculation(_) => "calculation_error",
            ServiceError::Persistence(_) => "persistence_error",
            ServiceError::EngineUnavailable(_) => "engine_unavailable",
            ServiceError::Config(_) => "config_error",
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => ServiceError::Validation(msg),
            CoreError::Serialization(e) => ServiceError::Validation(e.to_string()),
        }
    }
}

impl From<RiskError> for ServiceError {
    fn from(err: RiskError) -> Self {
        match err {
            RiskError::Calculation(msg) => ServiceError::Calculation(msg),
            RiskError::InvalidInput(msg) | RiskError::MissingFacility(msg) => {
                ServiceError::Validation(msg)
            }
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ServiceError::Validation(msg),
            EngineError::Unavailable(msg) => ServiceError::EngineUnavailable(msg),
            EngineError::Serialization(e) => ServiceError::Validation(e.to_string()),
        }
    }
}

impl From<CompilerError> for ServiceError {
    fn from(err: CompilerError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidQuery(msg) => ServiceError::Validation(msg),
            other => ServiceError::Persistence(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
