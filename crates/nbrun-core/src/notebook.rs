//! Core notebook data model.
//!
//! The model is deliberately small: an ordered list of cells with source
//! text and execution outputs, plus the kernel/language metadata needed for
//! export. Cells parsed from a percent-format script keep their source
//! exactly as it appears in the buffer (markdown bodies stay
//! comment-prefixed), so line reconciliation can match by string equality.

/// An ordered sequence of cells plus notebook-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notebook {
    /// Notebook-level metadata
    pub metadata: NotebookMetadata,
    /// List of cells in the notebook
    pub cells: Vec<Cell>,
}

impl Notebook {
    /// Create an empty notebook with the given cells.
    #[must_use]
    pub fn with_cells(cells: Vec<Cell>) -> Self {
        Self {
            metadata: NotebookMetadata::default(),
            cells,
        }
    }

    /// Indices and sources of the code cells up to and including `cell`,
    /// in notebook order. This is the execution prefix for running `cell`.
    #[must_use]
    pub fn code_prefix(&self, cell: usize) -> Vec<(usize, &str)> {
        self.cells
            .iter()
            .enumerate()
            .take(cell + 1)
            .filter(|(_, c)| c.cell_type == CellType::Code)
            .map(|(i, c)| (i, c.source.as_str()))
            .collect()
    }
}

/// Notebook-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotebookMetadata {
    /// Kernel name (e.g., "python3")
    pub kernel_name: Option<String>,
    /// Programming language name (e.g., "python")
    pub language: Option<String>,
    /// Notebook title if specified
    pub title: Option<String>,
}

/// A single notebook cell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    /// Type of cell (code, markdown, raw)
    pub cell_type: CellType,
    /// Cell source content
    pub source: String,
    /// Optional cell title from the percent marker (`# %% Title`)
    pub title: Option<String>,
    /// Execution count for code cells
    pub execution_count: Option<i32>,
    /// Cell outputs, populated after execution
    pub outputs: Vec<CellOutput>,
}

impl Cell {
    /// Create a code cell from source text.
    #[must_use]
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellType::Code,
            source: source.into(),
            ..Self::default()
        }
    }

    /// Create a markdown cell from source text.
    #[must_use]
    pub fn markdown(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellType::Markdown,
            source: source.into(),
            ..Self::default()
        }
    }

    /// Create a raw cell from source text.
    #[must_use]
    pub fn raw(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellType::Raw,
            source: source.into(),
            ..Self::default()
        }
    }

    /// Source split into lines, in the order the mapper consumes them.
    pub fn source_lines(&self) -> std::str::Lines<'_> {
        self.source.lines()
    }

    /// Number of source lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.source.lines().count()
    }

    /// Whether this cell ended with an error output.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.outputs
            .iter()
            .any(|o| o.output_type == OutputType::Error)
    }
}

/// Type of notebook cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CellType {
    /// Executable code cell
    #[default]
    Code,
    /// Markdown documentation cell
    Markdown,
    /// Raw text cell (no formatting)
    Raw,
}

impl std::fmt::Display for CellType {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Code => "code",
            Self::Markdown => "markdown",
            Self::Raw => "raw",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CellType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "markdown" | "md" => Ok(Self::Markdown),
            "raw" | "text" => Ok(Self::Raw),
            _ => Err(format!(
                "Unknown cell type '{s}'. Expected: code, markdown, raw"
            )),
        }
    }
}

/// A single cell output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellOutput {
    /// Type of output (`stream`, `display_data`, `execute_result`, `error`)
    pub output_type: OutputType,
    /// Stream name (`stdout` or `stderr`), for stream outputs
    pub name: Option<String>,
    /// Text content of the output (text/plain for rich outputs)
    pub text: Option<String>,
    /// Exception class name, for error outputs
    pub ename: Option<String>,
    /// Exception value, for error outputs
    pub evalue: Option<String>,
    /// Raw traceback entries, for error outputs. Entries may span several
    /// lines and may carry ANSI color escapes.
    pub traceback: Vec<String>,
}

impl CellOutput {
    /// Create a stream output from captured stdout text.
    #[must_use]
    pub fn stream(text: impl Into<String>) -> Self {
        Self {
            output_type: OutputType::Stream,
            name: Some("stdout".to_string()),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Create a stream output from captured stderr text.
    #[must_use]
    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            output_type: OutputType::Stream,
            name: Some("stderr".to_string()),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Create an execute-result output from its text/plain representation.
    #[must_use]
    pub fn execute_result(text: impl Into<String>) -> Self {
        Self {
            output_type: OutputType::ExecuteResult,
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Create an error output from an exception triple.
    #[must_use]
    pub fn error(
        ename: impl Into<String>,
        evalue: impl Into<String>,
        traceback: Vec<String>,
    ) -> Self {
        Self {
            output_type: OutputType::Error,
            name: None,
            text: None,
            ename: Some(ename.into()),
            evalue: Some(evalue.into()),
            traceback,
        }
    }
}

/// Type of cell output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputType {
    /// Stream output (stdout/stderr)
    #[default]
    Stream,
    /// Rich display data (images, HTML, etc.)
    DisplayData,
    /// Result of code execution
    ExecuteResult,
    /// Error traceback
    Error,
}

impl std::fmt::Display for OutputType {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stream => "stream",
            Self::DisplayData => "display_data",
            Self::ExecuteResult => "execute_result",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OutputType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "stream" | "stdout" | "stderr" => Ok(Self::Stream),
            "display_data" | "display" => Ok(Self::DisplayData),
            "execute_result" | "result" => Ok(Self::ExecuteResult),
            "error" | "traceback" => Ok(Self::Error),
            _ => Err(format!(
                "Unknown output type '{s}'. Expected: stream, display_data, execute_result, error"
            )),
        }
    }
}
