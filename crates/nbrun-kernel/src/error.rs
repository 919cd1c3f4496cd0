//! Error types for kernel discovery and execution

use std::path::PathBuf;
use thiserror::Error;

/// Error type for kernel operations
#[derive(Error, Debug)]
pub enum KernelError {
    /// I/O error while scanning the runtime directory or running a cell
    #[error("Kernel I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed connection file or executor result
    #[error("Failed to parse kernel JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The Jupyter runtime directory could not be resolved
    #[error("Jupyter runtime directory not found (set JUPYTER_RUNTIME_DIR)")]
    RuntimeDirNotFound,

    /// The interpreter could not be spawned
    #[error("Failed to spawn interpreter {program:?}: {source}")]
    SpawnFailed {
        /// The interpreter program that failed to start
        program: PathBuf,
        /// Underlying spawn error
        source: std::io::Error,
    },

    /// Cell execution exceeded the configured timeout
    #[error("Cell execution timed out after {0} seconds")]
    Timeout(u64),

    /// The interpreter exited without producing a result
    #[error("Interpreter exited abnormally: {0}")]
    ExecutionFailed(String),
}

/// Result type alias for kernel operations
pub type Result<T> = std::result::Result<T, KernelError>;
