//! # nbrun-kernel
//!
//! Kernel discovery and cell execution delegation for nbrun.
//!
//! Execution semantics belong to external infrastructure (a Jupyter kernel,
//! an interpreter); this crate provides the glue around it:
//! - Discovery of `kernel-*.json` connection files in the Jupyter runtime
//!   directory
//! - A serde model of connection files
//! - The [`CellExecutor`] seam and a subprocess-backed implementation that
//!   runs a cell prefix through a local `python3`
//!
//! ## Example
//!
//! ```no_run
//! use nbrun_kernel::{CellExecutor, ExecuteRequest, LocalPythonExecutor};
//!
//! let mut executor = LocalPythonExecutor::new();
//! let request = ExecuteRequest::new(vec![(0, "x = 1".into()), (1, "print(x)".into())]);
//! let outputs = executor.execute(&request)?;
//! # Ok::<(), nbrun_kernel::KernelError>(())
//! ```

/// Serde model of kernel connection files
pub mod connection;
/// Jupyter runtime-dir scanning
pub mod discovery;
/// Error types for kernel operations
pub mod error;
/// The execution seam and the local subprocess delegate
pub mod executor;

pub use connection::ConnectionInfo;
pub use discovery::{list_connection_files, runtime_dir, KernelEntry};
pub use error::{KernelError, Result};
pub use executor::{CellExecutor, ExecuteRequest, LocalPythonExecutor};
