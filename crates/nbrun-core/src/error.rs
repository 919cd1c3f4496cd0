//! Error types for notebook parsing and conversion

use thiserror::Error;

/// Error type for notebook operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O error when reading or writing a script or notebook file
    #[error("Failed to read notebook file: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error in an ipynb document
    #[error("Failed to parse notebook JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Buffer and notebook disagree about cell content
    #[error(transparent)]
    Mapping(#[from] crate::surjection::MappingError),

    /// Invalid notebook structure or format
    #[error("Invalid notebook format: {0}")]
    InvalidFormat(String),
}

/// Result type alias for notebook operations
pub type Result<T> = std::result::Result<T, CoreError>;
