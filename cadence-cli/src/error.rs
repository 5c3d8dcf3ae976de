//! Error types for the CLI.

use cadence_core::{CadenceError, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Cadence(#[from] CadenceError),
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Cadence(err.into())
    }
}

pub type CliResult<T> = Result<T, CliError>;
