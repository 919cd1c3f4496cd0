//! # nbrun-core
//!
//! Notebook model and line reconciliation for nbrun.
//!
//! This crate provides the pieces needed to execute a script-formatted
//! notebook cell-by-cell from a text editor buffer:
//! - A notebook data model (cells, outputs, metadata)
//! - A percent-format (`# %%`) script parser and writer
//! - The line-to-cell surjection that reconciles edited buffer lines with
//!   parsed cell coordinates
//! - A traceback parser that maps kernel error frames back to buffer lines
//! - An ipynb (nbformat 4.x) reader/writer
//! - An HTML serializer for rendering executed notebooks
//!
//! ## Example
//!
//! ```
//! use nbrun_core::{parse_script, Surjection};
//!
//! let text = "# %%\nx = 1\ny = 2\n# %%\nprint(x)\n";
//! let notebook = parse_script(text);
//! let lines: Vec<&str> = text.lines().collect();
//!
//! let surjection = Surjection::map(&lines, &notebook.cells)?;
//! // Line 1 ("x = 1") belongs to cell 0, line 0 of its source.
//! let hit = surjection.cell_at(1).unwrap();
//! assert_eq!((hit.cell, hit.line), (0, 0));
//! // Line 0 ("# %%") is a marker and belongs to no cell.
//! assert!(surjection.cell_at(0).is_none());
//! # Ok::<(), nbrun_core::MappingError>(())
//! ```

/// Error types for notebook operations
pub mod error;
/// nbformat 4.x (ipynb) reader and writer
pub mod ipynb;
/// Core notebook data model
pub mod notebook;
/// Percent-format script parsing
pub mod script;
/// Notebook serialization (HTML)
pub mod serializer;
/// Line-to-cell reconciliation
pub mod surjection;
/// Kernel traceback parsing and remapping
pub mod traceback;

pub use error::{CoreError, Result};
pub use ipynb::{notebook_from_ipynb, notebook_to_ipynb, read_ipynb, write_ipynb};
pub use notebook::{Cell, CellOutput, CellType, Notebook, NotebookMetadata, OutputType};
pub use script::{parse_script, write_script};
pub use serializer::{HtmlOptions, HtmlSerializer};
pub use surjection::{CellLine, MappingError, Surjection};
pub use traceback::{parse_frame, strip_ansi, TracebackFrame};
