//! Kernel traceback parsing and remapping.
//!
//! Error outputs carry traceback entries formatted for a terminal: ANSI
//! color escapes, arrowed source lines, and pseudo-filenames for cell code
//! (`<cell 2>`, `<ipython-input-5-...>`, `Cell In[3]`). This module strips
//! the formatting, extracts (file, line, function) frames, and rewrites
//! cell-relative frames into buffer coordinates through the surjection's
//! reverse lookup, so errors can be reported against the script the user is
//! actually editing.

use crate::surjection::{CellLine, Surjection};
use once_cell::sync::Lazy;
use regex::Regex;

static ANSI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ANSI regex"));

// CPython:  File "<cell 2>", line 3, in <module>
static PLAIN_FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*File "([^"]+)", line (\d+), in (.+)$"#).expect("valid frame regex")
});

// IPython >= 8:  File ~/project/util.py:12, in helper()
static IPY8_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^File ([^,:]+):(\d+), in (.+)$").expect("valid frame regex")
});

// IPython >= 8:  Cell In[3], line 2
static IPY8_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Cell In\[\d+\], line (\d+)").expect("valid frame regex"));

// Older IPython header:  /path/file.py in helper(x)   (line number on the
// arrowed line below it:  ----> 12 ...)
static LEGACY_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\S+) in ([^(\s]+)").expect("valid frame regex"));
static ARROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^-+>\s*(\d+)").expect("valid arrow regex"));

// Pseudo-filename used for cell code compiled by the executor.
static CELL_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<cell (\d+)>$").expect("valid cell-file regex"));

/// One stack frame extracted from a traceback entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracebackFrame {
    /// File name as reported by the kernel (possibly a cell pseudo-file)
    pub file: String,
    /// 1-based line number within that file
    pub line: usize,
    /// Function or scope name
    pub function: String,
}

impl TracebackFrame {
    /// The cell index this frame refers to, when its file is a cell
    /// pseudo-filename rather than a real file on disk.
    #[must_use]
    pub fn cell_index(&self) -> Option<usize> {
        if let Some(caps) = CELL_FILE_RE.captures(&self.file) {
            return caps[1].parse().ok();
        }
        None
    }

    /// Whether the frame points at executed cell code of *some* cell, even
    /// when the pseudo-filename does not encode which one.
    #[must_use]
    pub fn is_cell_frame(&self) -> bool {
        self.cell_index().is_some()
            || self.file.starts_with("<ipython-input")
            || self.file.starts_with("Cell In[")
    }

    /// Render the frame as a Python-style quickfix line.
    #[must_use]
    pub fn quickfix(&self) -> String {
        format!(
            "  File \"{}\", line {}, in {}",
            self.file, self.line, self.function
        )
    }
}

/// Remove ANSI SGR escape sequences.
#[must_use]
pub fn strip_ansi(s: &str) -> String {
    ANSI_RE.replace_all(s, "").into_owned()
}

/// Extract a stack frame from one traceback entry.
///
/// An entry may span several lines and carry ANSI escapes. Returns `None`
/// for entries that are not frames (the `Traceback (most recent call
/// last):` banner, the final exception line, separator rules).
#[must_use]
pub fn parse_frame(entry: &str) -> Option<TracebackFrame> {
    let plain = strip_ansi(entry);

    if let Some(caps) = PLAIN_FRAME_RE.captures(&plain) {
        return Some(TracebackFrame {
            file: caps[1].to_string(),
            line: caps[2].parse().ok()?,
            function: caps[3].trim().to_string(),
        });
    }

    if let Some(caps) = IPY8_FILE_RE.captures(&plain) {
        return Some(TracebackFrame {
            file: caps[1].to_string(),
            line: caps[2].parse().ok()?,
            function: caps[3].trim().to_string(),
        });
    }

    if let Some(caps) = IPY8_CELL_RE.captures(&plain) {
        let header = plain.lines().next().unwrap_or_default();
        return Some(TracebackFrame {
            file: header.split(',').next().unwrap_or("Cell In[?]").to_string(),
            line: caps[1].parse().ok()?,
            function: "<module>".to_string(),
        });
    }

    // Legacy colorized format: header gives file and function, the arrowed
    // line below gives the line number.
    if let (Some(header), Some(arrow)) =
        (LEGACY_HEADER_RE.captures(&plain), ARROW_RE.captures(&plain))
    {
        let file = header[1].to_string();
        // Headers are only frames when they name a file-ish thing, not
        // arbitrary prose that happens to contain " in ".
        if file.contains('/') || file.starts_with('<') || file.ends_with(".py") {
            return Some(TracebackFrame {
                file,
                line: arrow[1].parse().ok()?,
                function: header[2].to_string(),
            });
        }
    }

    None
}

/// Rewrite a cell-relative frame into buffer coordinates.
///
/// Frames whose pseudo-filename encodes a cell index use that cell; frames
/// that only say "executed cell code" fall back to `current_cell` (the cell
/// the caller just ran, mirroring how the original display resolved them).
/// Returns `None` when the frame does not refer to cell code, or when the
/// surjection has no buffer line for the coordinates (stale snapshot).
#[must_use]
pub fn remap_frame(
    frame: &TracebackFrame,
    surjection: &Surjection,
    current_cell: usize,
    buffer_name: &str,
) -> Option<TracebackFrame> {
    if !frame.is_cell_frame() || frame.line == 0 {
        return None;
    }
    let cell = frame.cell_index().unwrap_or(current_cell);
    let buffer_line = surjection.buffer_line(CellLine::new(cell, frame.line - 1))?;
    Some(TracebackFrame {
        file: buffer_name.to_string(),
        line: buffer_line + 1,
        function: frame.function.clone(),
    })
}

/// Turn raw traceback entries into quickfix lines against the buffer.
///
/// Cell frames are remapped through the surjection; frames in real files
/// (library code) pass through untouched; non-frame entries are dropped.
#[must_use]
pub fn remap_traceback(
    entries: &[String],
    surjection: &Surjection,
    current_cell: usize,
    buffer_name: &str,
) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in entries {
        let Some(frame) = parse_frame(entry) else {
            continue;
        };
        match remap_frame(&frame, surjection, current_cell, buffer_name) {
            Some(remapped) => lines.push(remapped.quickfix()),
            None if !frame.is_cell_frame() => lines.push(frame.quickfix()),
            // Cell frame the surjection cannot place: drop rather than
            // report a bogus line number.
            None => {}
        }
    }
    lines
}
