//! Line-to-cell reconciliation.
//!
//! An edited buffer holds the notebook's cell content interleaved with lines
//! no cell owns: percent markers, blank scaffolding, stray text the user
//! typed between cells. [`Surjection::map`] reconciles the two views with a
//! single greedy forward scan, producing one entry per buffer line that is
//! either the (cell, line-within-cell) pair owning it or nothing.
//!
//! The scan is recomputed from scratch for every execution request; it is
//! never cached across edits and is not restartable from the middle.

use crate::notebook::Cell;
use thiserror::Error;

/// Coordinates of a buffer line inside the parsed notebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellLine {
    /// Cell index within the notebook
    pub cell: usize,
    /// Line index within the cell's source
    pub line: usize,
}

impl CellLine {
    /// Convenience constructor.
    #[must_use]
    pub const fn new(cell: usize, line: usize) -> Self {
        Self { cell, line }
    }
}

/// Buffer and notebook disagree: a cell source line never appears in the
/// buffer after the scan cursor, so the buffer does not contain the cells'
/// lines as an in-order subsequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cell {cell}, line {line} ({content:?}) not found in buffer after line {cursor}")]
pub struct MappingError {
    /// Cell index whose line could not be matched
    pub cell: usize,
    /// Line index within the cell
    pub line: usize,
    /// The unmatched line content
    pub content: String,
    /// Buffer position the cursor had reached when the scan failed
    pub cursor: usize,
}

/// Mapping from buffer line indices onto cell coordinates.
///
/// One entry per buffer line; `None` means no cell owns the line. Entries
/// that are `Some` are monotonic in buffer order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Surjection {
    entries: Vec<Option<CellLine>>,
}

impl Surjection {
    /// Reconcile buffer lines with the cells' source lines.
    ///
    /// A single cursor walks the buffer. For each cell line in notebook
    /// order, the cursor skips buffer lines until one compares equal (exact
    /// string equality, no whitespace normalization), records the match, and
    /// moves on without resetting. Buffer lines the cursor skips — and any
    /// after the last match — stay unmapped, which is a normal outcome, not
    /// an error.
    ///
    /// Matching is first-found-after-cursor: if a cell line's content also
    /// occurs earlier in the buffer as a line no cell owns, that earlier
    /// occurrence is consumed instead. Callers must keep cell content from
    /// being duplicated ahead of its true position.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError`] when a cell line never reappears in the
    /// buffer after the cursor, i.e. the buffer does not contain the cells'
    /// lines as an in-order subsequence.
    pub fn map<S: AsRef<str>>(buffer: &[S], cells: &[Cell]) -> Result<Self, MappingError> {
        let mut entries = vec![None; buffer.len()];
        let mut i = 0;
        for (c, cell) in cells.iter().enumerate() {
            for (l, line) in cell.source_lines().enumerate() {
                while i < buffer.len() && buffer[i].as_ref() != line {
                    i += 1;
                }
                if i == buffer.len() {
                    return Err(MappingError {
                        cell: c,
                        line: l,
                        content: line.to_string(),
                        cursor: i,
                    });
                }
                entries[i] = Some(CellLine::new(c, l));
            }
        }
        log::trace!(
            "mapped {} of {} buffer lines onto {} cells",
            entries.iter().filter(|e| e.is_some()).count(),
            buffer.len(),
            cells.len()
        );
        Ok(Self { entries })
    }

    /// Number of buffer lines covered by the mapping.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cell coordinates owning `buffer_line`, or `None` when the line is
    /// outside any cell (or out of range).
    #[must_use]
    pub fn cell_at(&self, buffer_line: usize) -> Option<CellLine> {
        self.entries.get(buffer_line).copied().flatten()
    }

    /// Reverse lookup: the first buffer line mapped to `target`.
    ///
    /// Used to recover the buffer line number behind a traceback frame that
    /// reports cell-relative coordinates.
    #[must_use]
    pub fn buffer_line(&self, target: CellLine) -> Option<usize> {
        self.entries.iter().position(|e| *e == Some(target))
    }

    /// First and last buffer lines attributed to `cell`, if any of its
    /// lines were matched.
    #[must_use]
    pub fn cell_span(&self, cell: usize) -> Option<(usize, usize)> {
        let mut span = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.is_some_and(|e| e.cell == cell) {
                span = Some(match span {
                    None => (i, i),
                    Some((first, _)) => (first, i),
                });
            }
        }
        span
    }

    /// All entries, one per buffer line.
    #[must_use]
    pub fn entries(&self) -> &[Option<CellLine>] {
        &self.entries
    }
}
