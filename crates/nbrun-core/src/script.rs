//! Percent-format script parsing.
//!
//! Scripts use the jupytext "percent" convention: cells are delimited by
//! `# %%` marker lines, optionally carrying a title and a cell-type tag
//! (`# %% Intro [markdown]`). Marker lines belong to no cell; they are
//! exactly the lines the surjection leaves unmapped.
//!
//! Markdown and raw cell bodies appear comment-prefixed in the script. The
//! parser keeps that prefix in `Cell::source` so buffer reconciliation can
//! match lines by exact equality; [`uncomment_lines`] strips it at export
//! boundaries (HTML, ipynb).

use crate::notebook::{Cell, CellType, Notebook};
use once_cell::sync::Lazy;
use regex::Regex;

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#\s*%%\s*(.*)$").expect("valid marker regex")
});

struct Marker {
    cell_type: CellType,
    title: Option<String>,
}

/// Parse a `# %%` marker line, if `line` is one.
fn parse_marker(line: &str) -> Option<Marker> {
    let caps = MARKER_RE.captures(line)?;
    let mut rest = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();

    let mut cell_type = CellType::Code;
    for (tag, ty) in [
        ("[markdown]", CellType::Markdown),
        ("[md]", CellType::Markdown),
        ("[raw]", CellType::Raw),
    ] {
        if let Some(pos) = rest.find(tag) {
            cell_type = ty;
            rest.replace_range(pos..pos + tag.len(), "");
            break;
        }
    }

    let rest = rest.trim();
    let title = (!rest.is_empty()).then(|| rest.to_string());
    Some(Marker { cell_type, title })
}

/// Parse a percent-format script into a notebook.
///
/// Lines before the first marker become an implicit code cell when any of
/// them is non-blank (shebangs and encoding comments included). Blank lines
/// directly around a cell body are scaffolding and are trimmed from the
/// cell's source; blank lines inside a body are kept.
#[must_use]
pub fn parse_script(text: &str) -> Notebook {
    let mut cells = Vec::new();
    let mut pending: Option<Marker> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in text.lines() {
        if let Some(marker) = parse_marker(line) {
            flush(&mut cells, pending.take(), &body);
            body.clear();
            pending = Some(marker);
        } else {
            body.push(line);
        }
    }
    flush(&mut cells, pending.take(), &body);

    log::debug!("parsed script into {} cells", cells.len());
    let mut notebook = Notebook::with_cells(cells);
    notebook.metadata.language = Some("python".to_string());
    notebook
}

fn flush(cells: &mut Vec<Cell>, marker: Option<Marker>, body: &[&str]) {
    let trimmed = trim_blank(body);
    match marker {
        // Preamble before the first marker: only a cell when non-empty.
        None => {
            if !trimmed.is_empty() {
                cells.push(Cell::code(trimmed.join("\n")));
            }
        }
        Some(marker) => {
            let mut cell = Cell {
                cell_type: marker.cell_type,
                source: trimmed.join("\n"),
                ..Cell::default()
            };
            cell.title = marker.title;
            cells.push(cell);
        }
    }
}

fn trim_blank<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(start, |p| p + 1);
    lines[start..end].to_vec()
}

/// Write a notebook back out as a percent-format script.
///
/// Markdown and raw bodies are comment-prefixed on the way out; lines that
/// already carry a comment prefix (cells that came from a parsed script)
/// are left as they are.
#[must_use]
pub fn write_script(notebook: &Notebook) -> String {
    let mut out = String::new();
    for cell in &notebook.cells {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("# %%");
        if let Some(title) = &cell.title {
            out.push(' ');
            out.push_str(title);
        }
        match cell.cell_type {
            CellType::Code => {}
            CellType::Markdown => out.push_str(" [markdown]"),
            CellType::Raw => out.push_str(" [raw]"),
        }
        out.push('\n');
        let body = match cell.cell_type {
            CellType::Code => cell.source.clone(),
            // Script-sourced bodies are already commented; only native
            // markdown gets the prefix added.
            CellType::Markdown | CellType::Raw => {
                if is_commented(&cell.source) {
                    cell.source.clone()
                } else {
                    comment_lines(&cell.source)
                }
            }
        };
        if !body.is_empty() {
            out.push_str(&body);
            out.push('\n');
        }
    }
    out
}

/// Whether every non-blank line of a markdown/raw body carries the script
/// comment prefix. Distinguishes script-sourced bodies (kept commented for
/// reconciliation) from native ipynb markdown.
#[must_use]
pub fn is_commented(source: &str) -> bool {
    source
        .lines()
        .filter(|l| !l.trim().is_empty())
        .all(|l| l.starts_with('#'))
}

/// Strip the `# ` comment prefix from each line of a script-sourced
/// markdown/raw body. Bodies that are not fully commented (native ipynb
/// markdown) pass through unchanged.
#[must_use]
pub fn uncomment_lines(source: &str) -> String {
    if !is_commented(source) {
        return source.to_string();
    }
    source
        .lines()
        .map(|line| {
            line.strip_prefix("# ")
                .or_else(|| line.strip_prefix('#'))
                .unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Comment-prefix each line of a markdown/raw body for script output.
#[must_use]
pub fn comment_lines(source: &str) -> String {
    source
        .lines()
        .map(|line| {
            if line.is_empty() {
                "#".to_string()
            } else {
                format!("# {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_code_cells() {
        let nb = parse_script("# %%\nx = 1\ny = 2\n\n# %%\nprint(x)\n");
        assert_eq!(nb.cells.len(), 2);
        assert_eq!(nb.cells[0].source, "x = 1\ny = 2");
        assert_eq!(nb.cells[1].source, "print(x)");
        assert!(nb.cells.iter().all(|c| c.cell_type == CellType::Code));
    }

    #[test]
    fn test_parse_marker_variants() {
        assert!(parse_marker("# %%").is_some());
        assert!(parse_marker("#%%").is_some());
        assert!(parse_marker("# %% Title here").is_some());
        assert!(parse_marker("x = 1  # %% not a marker").is_none());
        assert!(parse_marker("print('# %%')").is_none());
    }

    #[test]
    fn test_parse_markdown_cell_keeps_comment_prefix() {
        let nb = parse_script("# %% [markdown]\n# Heading\n# body text\n\n# %%\nx = 1\n");
        assert_eq!(nb.cells.len(), 2);
        assert_eq!(nb.cells[0].cell_type, CellType::Markdown);
        // Source stays exactly as it appears in the buffer.
        assert_eq!(nb.cells[0].source, "# Heading\n# body text");
    }

    #[test]
    fn test_parse_title_and_tag() {
        let nb = parse_script("# %% Setup [markdown]\n# Notes\n");
        assert_eq!(nb.cells[0].title.as_deref(), Some("Setup"));
        assert_eq!(nb.cells[0].cell_type, CellType::Markdown);

        let nb = parse_script("# %% Load data\nimport csv\n");
        assert_eq!(nb.cells[0].title.as_deref(), Some("Load data"));
        assert_eq!(nb.cells[0].cell_type, CellType::Code);
    }

    #[test]
    fn test_preamble_becomes_implicit_code_cell() {
        let nb = parse_script("import sys\n\n# %%\nprint(sys.path)\n");
        assert_eq!(nb.cells.len(), 2);
        assert_eq!(nb.cells[0].source, "import sys");
    }

    #[test]
    fn test_blank_preamble_is_dropped() {
        let nb = parse_script("\n\n# %%\nx = 1\n");
        assert_eq!(nb.cells.len(), 1);
    }

    #[test]
    fn test_blank_lines_inside_cell_are_kept() {
        let nb = parse_script("# %%\na = 1\n\nb = 2\n");
        assert_eq!(nb.cells[0].source, "a = 1\n\nb = 2");
    }

    #[test]
    fn test_empty_cell_is_kept() {
        let nb = parse_script("# %%\n\n# %%\nx = 1\n");
        assert_eq!(nb.cells.len(), 2);
        assert_eq!(nb.cells[0].source, "");
    }

    #[test]
    fn test_write_script_roundtrip() {
        let text = "# %% Setup\nimport sys\n\n# %% Notes [markdown]\n# Heading\n\n# %%\nprint(1)\n";
        let nb = parse_script(text);
        let written = write_script(&nb);
        let reparsed = parse_script(&written);
        assert_eq!(nb.cells, reparsed.cells);
    }

    #[test]
    fn test_uncomment_lines() {
        assert_eq!(uncomment_lines("# Heading\n#\n# body"), "Heading\n\nbody");
        // Not fully commented: native markdown, left unchanged.
        assert_eq!(uncomment_lines("# Title\nplain prose"), "# Title\nplain prose");
    }

    #[test]
    fn test_comment_lines() {
        assert_eq!(comment_lines("Heading\n\nbody"), "# Heading\n#\n# body");
        // Native markdown headings pick up a second hash so uncommenting
        // restores them exactly.
        assert_eq!(comment_lines("# Heading"), "# # Heading");
    }

    #[test]
    fn test_native_markdown_survives_script_roundtrip() {
        let nb = Notebook::with_cells(vec![Cell::markdown("# Title\n\nProse line.")]);
        let script = write_script(&nb);
        let reparsed = parse_script(&script);
        assert_eq!(
            uncomment_lines(&reparsed.cells[0].source),
            "# Title\n\nProse line."
        );
    }

    #[test]
    fn test_parsed_script_lines_reconcile_exactly() {
        // Every cell source line must reappear verbatim in the buffer,
        // including markdown bodies, or the mapper cannot reconcile them.
        let text = "# %% [markdown]\n# Notes\n\n# %%\nx = 1\n";
        let nb = parse_script(text);
        let buffer: Vec<&str> = text.lines().collect();
        let s = crate::surjection::Surjection::map(&buffer, &nb.cells).unwrap();
        assert_eq!(s.cell_at(1), Some(crate::surjection::CellLine::new(0, 0)));
        assert_eq!(s.cell_at(4), Some(crate::surjection::CellLine::new(1, 0)));
    }
}
