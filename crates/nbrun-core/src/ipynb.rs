//! nbformat 4.x (ipynb) reader and writer.
//!
//! The JSON schema is modeled directly with serde: cells tagged by
//! `cell_type`, outputs tagged by `output_type`, and source text accepted as
//! either a plain string or the line-array form Jupyter writes. Conversion
//! to and from the core [`Notebook`] model follows the same extraction rules
//! as notebook ingestion elsewhere (join source fragments, keep the
//! text/plain representation of rich outputs, flatten error triples).

use crate::error::{CoreError, Result};
use crate::notebook::{Cell, CellOutput, CellType, Notebook, NotebookMetadata, OutputType};
use crate::script;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Source text in a raw ipynb document: Jupyter writes an array of
/// line fragments, but a plain string is also valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
enum SourceText {
    Text(String),
    Lines(Vec<String>),
}

impl SourceText {
    fn join(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Lines(lines) => lines.concat(),
        }
    }
}

impl From<&str> for SourceText {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawNotebook {
    nbformat: u32,
    nbformat_minor: u32,
    #[serde(default)]
    metadata: RawMetadata,
    cells: Vec<RawCell>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kernelspec: Option<RawKernelspec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language_info: Option<RawLanguageInfo>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawKernelspec {
    name: String,
    display_name: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawLanguageInfo {
    name: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum RawCell {
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        source: SourceText,
        #[serde(default)]
        execution_count: Option<i32>,
        #[serde(default)]
        outputs: Vec<RawOutput>,
    },
    Markdown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        source: SourceText,
    },
    Raw {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        source: SourceText,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
enum RawOutput {
    Stream {
        name: String,
        text: SourceText,
    },
    DisplayData {
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<i32>,
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

/// Read and convert an ipynb file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the notebook JSON is
/// malformed.
pub fn read_ipynb<P: AsRef<Path>>(path: P) -> Result<Notebook> {
    let content = fs::read_to_string(path)?;
    notebook_from_ipynb(&content)
}

/// Parse an ipynb document from a string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or the nbformat major version
/// is not 4.
pub fn notebook_from_ipynb(content: &str) -> Result<Notebook> {
    let raw: RawNotebook = serde_json::from_str(content)?;
    if raw.nbformat != 4 {
        return Err(CoreError::InvalidFormat(format!(
            "unsupported nbformat version {}.{}",
            raw.nbformat, raw.nbformat_minor
        )));
    }

    let metadata = NotebookMetadata {
        kernel_name: raw.metadata.kernelspec.as_ref().map(|ks| ks.name.clone()),
        language: raw
            .metadata
            .language_info
            .as_ref()
            .map(|li| li.name.clone()),
        title: raw
            .metadata
            .extra
            .get("title")
            .and_then(Value::as_str)
            .map(String::from),
    };

    let cells = raw.cells.into_iter().map(convert_cell).collect();
    Ok(Notebook { metadata, cells })
}

fn convert_cell(raw: RawCell) -> Cell {
    match raw {
        RawCell::Code {
            source,
            execution_count,
            outputs,
            ..
        } => {
            let mut cell = Cell::code(source.join());
            cell.execution_count = execution_count;
            cell.outputs = outputs.into_iter().map(convert_output).collect();
            cell
        }
        RawCell::Markdown { source, .. } => Cell::markdown(source.join()),
        RawCell::Raw { source, .. } => Cell::raw(source.join()),
    }
}

fn convert_output(raw: RawOutput) -> CellOutput {
    match raw {
        RawOutput::Stream { name, text } => CellOutput {
            output_type: OutputType::Stream,
            name: Some(name),
            text: Some(text.join()),
            ..CellOutput::default()
        },
        RawOutput::DisplayData { data, .. } => CellOutput {
            output_type: OutputType::DisplayData,
            text: plain_text(&data),
            ..CellOutput::default()
        },
        RawOutput::ExecuteResult { data, .. } => CellOutput {
            output_type: OutputType::ExecuteResult,
            text: plain_text(&data),
            ..CellOutput::default()
        },
        RawOutput::Error {
            ename,
            evalue,
            traceback,
        } => CellOutput::error(ename, evalue, traceback),
    }
}

/// The text/plain representation of a rich output's media bundle.
fn plain_text(data: &Map<String, Value>) -> Option<String> {
    match data.get("text/plain") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(fragments)) => Some(
            fragments
                .iter()
                .filter_map(Value::as_str)
                .collect::<String>(),
        ),
        _ => None,
    }
}

/// Serialize a notebook as an nbformat 4.5 JSON document.
///
/// Markdown and raw cells that came from a percent-format script keep their
/// comment prefix in the core model; it is stripped here so the ipynb holds
/// native markdown.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn notebook_to_ipynb(notebook: &Notebook) -> Result<String> {
    let cells = notebook
        .cells
        .iter()
        .map(|cell| match cell.cell_type {
            CellType::Code => RawCell::Code {
                id: None,
                metadata: Map::new(),
                source: cell.source.as_str().into(),
                execution_count: cell.execution_count,
                outputs: cell.outputs.iter().map(raw_output).collect(),
            },
            CellType::Markdown => RawCell::Markdown {
                id: None,
                metadata: Map::new(),
                source: script::uncomment_lines(&cell.source).as_str().into(),
            },
            CellType::Raw => RawCell::Raw {
                id: None,
                metadata: Map::new(),
                source: script::uncomment_lines(&cell.source).as_str().into(),
            },
        })
        .collect();

    let kernel_name = notebook
        .metadata
        .kernel_name
        .clone()
        .unwrap_or_else(|| "python3".to_string());
    let language = notebook
        .metadata
        .language
        .clone()
        .unwrap_or_else(|| "python".to_string());

    let raw = RawNotebook {
        nbformat: 4,
        nbformat_minor: 5,
        metadata: RawMetadata {
            kernelspec: Some(RawKernelspec {
                display_name: kernel_name.clone(),
                name: kernel_name,
                extra: Map::new(),
            }),
            language_info: Some(RawLanguageInfo {
                name: language,
                extra: Map::new(),
            }),
            extra: Map::new(),
        },
        cells,
    };
    Ok(serde_json::to_string_pretty(&raw)?)
}

fn raw_output(output: &CellOutput) -> RawOutput {
    match output.output_type {
        OutputType::Stream => RawOutput::Stream {
            name: output
                .name
                .clone()
                .unwrap_or_else(|| "stdout".to_string()),
            text: output.text.as_deref().unwrap_or_default().into(),
        },
        OutputType::DisplayData => RawOutput::DisplayData {
            data: text_bundle(output),
            metadata: Map::new(),
        },
        OutputType::ExecuteResult => RawOutput::ExecuteResult {
            execution_count: None,
            data: text_bundle(output),
            metadata: Map::new(),
        },
        OutputType::Error => RawOutput::Error {
            ename: output.ename.clone().unwrap_or_default(),
            evalue: output.evalue.clone().unwrap_or_default(),
            traceback: output.traceback.clone(),
        },
    }
}

fn text_bundle(output: &CellOutput) -> Map<String, Value> {
    let mut data = Map::new();
    if let Some(text) = &output.text {
        data.insert("text/plain".to_string(), Value::String(text.clone()));
    }
    data
}

/// Convert and write a notebook to an ipynb file.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_ipynb<P: AsRef<Path>>(path: P, notebook: &Notebook) -> Result<()> {
    let json = notebook_to_ipynb(notebook)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_notebook() {
        let notebook_json = r##"{
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {
                "kernelspec": {
                    "name": "python3",
                    "display_name": "Python 3"
                },
                "language_info": {
                    "name": "python",
                    "version": "3.11.0"
                }
            },
            "cells": [
                {
                    "id": "cell-1",
                    "cell_type": "markdown",
                    "metadata": {},
                    "source": ["# Hello\n", "Intro text."]
                },
                {
                    "id": "cell-2",
                    "cell_type": "code",
                    "metadata": {},
                    "execution_count": 1,
                    "source": ["print(\"hi\")"],
                    "outputs": [
                        {
                            "output_type": "stream",
                            "name": "stdout",
                            "text": ["hi\n"]
                        }
                    ]
                }
            ]
        }"##;

        let nb = notebook_from_ipynb(notebook_json).unwrap();
        assert_eq!(nb.cells.len(), 2);
        assert_eq!(nb.cells[0].cell_type, CellType::Markdown);
        assert_eq!(nb.cells[0].source, "# Hello\nIntro text.");
        assert_eq!(nb.cells[1].cell_type, CellType::Code);
        assert_eq!(nb.cells[1].outputs[0].text.as_deref(), Some("hi\n"));
        assert_eq!(nb.metadata.kernel_name.as_deref(), Some("python3"));
        assert_eq!(nb.metadata.language.as_deref(), Some("python"));
    }

    #[test]
    fn test_parse_execute_result_text_plain() {
        let notebook_json = r#"{
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {},
            "cells": [
                {
                    "cell_type": "code",
                    "metadata": {},
                    "execution_count": 1,
                    "source": "2 + 2",
                    "outputs": [
                        {
                            "output_type": "execute_result",
                            "execution_count": 1,
                            "data": { "text/plain": "4" },
                            "metadata": {}
                        }
                    ]
                }
            ]
        }"#;

        let nb = notebook_from_ipynb(notebook_json).unwrap();
        assert_eq!(
            nb.cells[0].outputs[0].output_type,
            OutputType::ExecuteResult
        );
        assert_eq!(nb.cells[0].outputs[0].text.as_deref(), Some("4"));
    }

    #[test]
    fn test_parse_error_output() {
        let notebook_json = r#"{
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {},
            "cells": [
                {
                    "cell_type": "code",
                    "metadata": {},
                    "execution_count": 1,
                    "source": "1 / 0",
                    "outputs": [
                        {
                            "output_type": "error",
                            "ename": "ZeroDivisionError",
                            "evalue": "division by zero",
                            "traceback": ["Traceback (most recent call last):"]
                        }
                    ]
                }
            ]
        }"#;

        let nb = notebook_from_ipynb(notebook_json).unwrap();
        let output = &nb.cells[0].outputs[0];
        assert_eq!(output.output_type, OutputType::Error);
        assert_eq!(output.ename.as_deref(), Some("ZeroDivisionError"));
        assert_eq!(output.traceback.len(), 1);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let notebook_json = r#"{"nbformat": 3, "nbformat_minor": 0, "metadata": {}, "cells": []}"#;
        let err = notebook_from_ipynb(notebook_json).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat(_)));
    }

    #[test]
    fn test_write_uncomments_markdown() {
        let nb = Notebook::with_cells(vec![
            Cell::markdown("# Heading\n# body"),
            Cell::code("x = 1"),
        ]);
        let json = notebook_to_ipynb(&nb).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["cells"][0]["source"], "Heading\nbody");
        assert_eq!(parsed["cells"][1]["outputs"], serde_json::json!([]));
    }

    #[test]
    fn test_stream_name_roundtrips() {
        let mut cell = Cell::code("import sys\nsys.stderr.write('oops')");
        cell.outputs.push(CellOutput::stderr("oops"));
        cell.outputs.push(CellOutput::stream("fine\n"));
        let nb = Notebook::with_cells(vec![cell]);

        let json = notebook_to_ipynb(&nb).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["cells"][0]["outputs"][0]["name"], "stderr");
        assert_eq!(parsed["cells"][0]["outputs"][1]["name"], "stdout");

        let back = notebook_from_ipynb(&json).unwrap();
        assert_eq!(back.cells[0].outputs[0].name.as_deref(), Some("stderr"));
        assert_eq!(back.cells[0].outputs[1].name.as_deref(), Some("stdout"));
    }

    #[test]
    fn test_script_to_ipynb_roundtrip() {
        let text = "# %% [markdown]\n# Notes\n\n# %%\nx = 1\nprint(x)\n";
        let nb = crate::script::parse_script(text);
        let json = notebook_to_ipynb(&nb).unwrap();
        let back = notebook_from_ipynb(&json).unwrap();
        assert_eq!(back.cells.len(), 2);
        assert_eq!(back.cells[0].cell_type, CellType::Markdown);
        assert_eq!(back.cells[0].source, "Notes");
        assert_eq!(back.cells[1].source, "x = 1\nprint(x)");
    }
}
