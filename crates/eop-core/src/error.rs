//! Error types shared across the E/p pipeline crates.

use thiserror::Error;

/// Pipeline error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Selection expression error
    #[error("Selection error: {0}")]
    Selection(String),

    /// Intercalibration table error
    #[error("Calibration error: {0}")]
    Calib(String),

    /// Ntuple record error
    #[error("Ntuple error: {0}")]
    Ntuple(String),

    /// The input chain yielded no entries.
    #[error("input chain has no entries")]
    EmptyInput,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
