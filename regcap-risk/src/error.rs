//! Credit risk errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    /// Degenerate numeric input (PD at 0 or 1, non-finite intermediates)
    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No facility available: {0}")]
    MissingFacility(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
