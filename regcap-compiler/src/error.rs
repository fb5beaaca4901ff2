//! Compiler error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompilerError {
    /// A rule definition is structurally invalid
    #[error("Invalid rule definition: {0}")]
    Validation(String),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
