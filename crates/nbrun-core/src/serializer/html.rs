//! HTML serialization for executed notebooks.
//!
//! Renders a notebook as a standalone HTML page: markdown cells with a
//! minimal heading/paragraph renderer, code cells as preformatted blocks,
//! and outputs (streams, results, ANSI-stripped error tracebacks) beneath
//! the cell that produced them. With live reload enabled, the page loads
//! live.js so a browser re-renders whenever the file is rewritten after a
//! cell run.

use crate::notebook::{CellType, Notebook, OutputType};
use crate::script::uncomment_lines;
use crate::traceback::strip_ansi;
use std::fmt::Write;

const LIVE_RELOAD_TAG: &str =
    r#"<script type="text/javascript" src="http://livejs.com/live.js"></script>"#;

const STYLES: &str = "\
body { max-width: 50rem; margin: 2rem auto; font-family: sans-serif; }
pre { background: #f4f4f4; padding: 0.6rem; overflow-x: auto; }
pre.error { background: #fff0f0; color: #a00; }
pre.stream, pre.result { background: #fafafa; border-left: 3px solid #ccc; }
div.cell { margin-bottom: 1.2rem; }
";

/// Configuration options for HTML serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Page title. Defaults to the notebook title or "notebook".
    pub title: Option<String>,
    /// Inject the live.js reload tag into the page head.
    pub live_reload: bool,
    /// Embed the default stylesheet.
    pub include_styles: bool,
}

impl HtmlOptions {
    /// Options used by the run path: styled page that reloads on rewrite.
    #[must_use]
    pub fn live() -> Self {
        Self {
            title: None,
            live_reload: true,
            include_styles: true,
        }
    }
}

/// Serializer that renders a [`Notebook`] to a standalone HTML page.
#[derive(Debug, Clone, Default)]
pub struct HtmlSerializer {
    options: HtmlOptions,
}

impl HtmlSerializer {
    /// Create a serializer with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a serializer with custom options.
    #[must_use]
    pub fn with_options(options: HtmlOptions) -> Self {
        Self { options }
    }

    /// Render the notebook as a complete HTML document.
    #[must_use]
    pub fn serialize(&self, notebook: &Notebook) -> String {
        let title = self
            .options
            .title
            .clone()
            .or_else(|| notebook.metadata.title.clone())
            .unwrap_or_else(|| "notebook".to_string());

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        if self.options.live_reload {
            html.push_str(LIVE_RELOAD_TAG);
            html.push('\n');
        }
        let _ = writeln!(html, "<title>{}</title>", escape(&title));
        if self.options.include_styles {
            let _ = writeln!(html, "<style>\n{STYLES}</style>");
        }
        html.push_str("</head>\n<body>\n");

        for (i, cell) in notebook.cells.iter().enumerate() {
            let _ = writeln!(html, "<div class=\"cell\" id=\"cell-{i}\">");
            match cell.cell_type {
                CellType::Markdown => render_markdown(&mut html, &cell.source),
                CellType::Code => {
                    let _ = writeln!(html, "<pre><code>{}</code></pre>", escape(&cell.source));
                    for output in &cell.outputs {
                        render_output(&mut html, output);
                    }
                }
                CellType::Raw => {
                    let _ = writeln!(html, "<pre>{}</pre>", escape(&cell.source));
                }
            }
            html.push_str("</div>\n");
        }

        html.push_str("</body>\n</html>\n");
        log::trace!("rendered {} cells to {} bytes of HTML", notebook.cells.len(), html.len());
        html
    }
}

fn render_output(html: &mut String, output: &crate::notebook::CellOutput) {
    match output.output_type {
        OutputType::Error => {
            let mut text = String::new();
            if let (Some(ename), Some(evalue)) = (&output.ename, &output.evalue) {
                let _ = writeln!(text, "{ename}: {evalue}");
            }
            for entry in &output.traceback {
                text.push_str(&strip_ansi(entry));
                if !entry.ends_with('\n') {
                    text.push('\n');
                }
            }
            let _ = writeln!(html, "<pre class=\"error\">{}</pre>", escape(text.trim_end()));
        }
        OutputType::Stream => {
            if let Some(text) = &output.text {
                let _ = writeln!(html, "<pre class=\"stream\">{}</pre>", escape(text.trim_end()));
            }
        }
        OutputType::ExecuteResult | OutputType::DisplayData => {
            if let Some(text) = &output.text {
                let _ = writeln!(html, "<pre class=\"result\">{}</pre>", escape(text.trim_end()));
            }
        }
    }
}

/// Minimal markdown rendering: ATX headings and blank-line paragraphs.
/// Comment prefixes from script-parsed cells are stripped first.
fn render_markdown(html: &mut String, source: &str) {
    let text = uncomment_lines(source);
    let mut paragraph: Vec<&str> = Vec::new();
    for line in text.lines().chain(std::iter::once("")) {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            if !paragraph.is_empty() {
                let _ = writeln!(html, "<p>{}</p>", escape(&paragraph.join(" ")));
                paragraph.clear();
            }
            continue;
        }
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
            if !paragraph.is_empty() {
                let _ = writeln!(html, "<p>{}</p>", escape(&paragraph.join(" ")));
                paragraph.clear();
            }
            let _ = writeln!(
                html,
                "<h{hashes}>{}</h{hashes}>",
                escape(trimmed[hashes..].trim())
            );
        } else {
            paragraph.push(trimmed);
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::{Cell, CellOutput, Notebook};

    fn sample() -> Notebook {
        let mut code = Cell::code("x = 1\nprint(x)");
        code.outputs.push(CellOutput::stream("1\n"));
        Notebook::with_cells(vec![Cell::markdown("# # Title\n# Some prose."), code])
    }

    #[test]
    fn test_serialize_renders_cells_and_outputs() {
        let html = HtmlSerializer::new().serialize(&sample());
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<p>Some prose.</p>"));
        assert!(html.contains("<pre><code>x = 1\nprint(x)</code></pre>"));
        assert!(html.contains("<pre class=\"stream\">1</pre>"));
    }

    #[test]
    fn test_live_reload_tag_injected_only_when_enabled() {
        let plain = HtmlSerializer::new().serialize(&sample());
        assert!(!plain.contains("live.js"));

        let live = HtmlSerializer::with_options(HtmlOptions::live()).serialize(&sample());
        assert!(live.contains(LIVE_RELOAD_TAG));
        // The tag sits in the head, before any cell content.
        assert!(live.find("live.js").unwrap() < live.find("cell-0").unwrap());
    }

    #[test]
    fn test_error_output_is_ansi_stripped_and_escaped() {
        let mut cell = Cell::code("1 / 0");
        cell.outputs.push(CellOutput::error(
            "ZeroDivisionError",
            "division by zero",
            vec!["\x1b[0;31mZeroDivisionError\x1b[0m: division <by> zero".to_string()],
        ));
        let html = HtmlSerializer::new().serialize(&Notebook::with_cells(vec![cell]));
        assert!(!html.contains('\x1b'));
        assert!(html.contains("division &lt;by&gt; zero"));
        assert!(html.contains("pre class=\"error\""));
    }

    #[test]
    fn test_code_is_escaped() {
        let nb = Notebook::with_cells(vec![Cell::code("if a < b:\n    pass")]);
        let html = HtmlSerializer::new().serialize(&nb);
        assert!(html.contains("if a &lt; b:"));
    }

    #[test]
    fn test_title_preference() {
        let mut nb = sample();
        nb.metadata.title = Some("Analysis".to_string());
        let html = HtmlSerializer::new().serialize(&nb);
        assert!(html.contains("<title>Analysis</title>"));

        let html = HtmlSerializer::with_options(HtmlOptions {
            title: Some("Override".to_string()),
            ..HtmlOptions::default()
        })
        .serialize(&nb);
        assert!(html.contains("<title>Override</title>"));
    }
}
