//! Error types for the datadesk-ml crate.

use datadesk_core::CoreError;
use thiserror::Error;

/// Top-level error type for engine operations.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MlError {
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// HTTP-equivalent status code, delegating to the core taxonomy.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Core(err) => err.status_code(),
            Self::InvalidInput(_) | Self::Serde(_) => 400,
            Self::Dataset(_) | Self::Analysis(_) | Self::Io(_) | Self::Csv(_) => 500,
        }
    }
}
