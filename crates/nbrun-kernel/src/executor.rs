//! The execution seam and the local subprocess delegate.
//!
//! [`CellExecutor`] is the boundary between the mapper/orchestration side
//! and whatever actually runs code. The request carries everything the
//! delegate needs — the code-cell prefix in notebook order — so no session
//! state lives on this side of the seam.
//!
//! [`LocalPythonExecutor`] is the shipped delegate: it replays the prefix
//! through a local `python3`, compiling each cell under a `<cell N>`
//! pseudo-filename so exception tracebacks report cell-relative line
//! numbers the traceback remapping understands.

use crate::error::{KernelError, Result};
use nbrun_core::CellOutput;
use serde::Deserialize;
use std::fs;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Everything a delegate needs to run one cell.
///
/// `cells` holds `(notebook_index, source)` pairs for the code cells up to
/// and including the target, in notebook order; the target is the last
/// entry. Markdown and raw cells are never included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteRequest {
    /// Code-cell prefix, ending with the cell to run
    pub cells: Vec<(usize, String)>,
    /// Wall-clock limit for the whole replay
    pub timeout: Option<Duration>,
}

impl ExecuteRequest {
    /// Build a request from a code-cell prefix.
    #[must_use]
    pub fn new(cells: Vec<(usize, String)>) -> Self {
        Self {
            cells,
            timeout: None,
        }
    }

    /// Set a wall-clock limit.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Notebook index of the cell being run (the last in the prefix).
    #[must_use]
    pub fn target_cell(&self) -> Option<usize> {
        self.cells.last().map(|(i, _)| *i)
    }
}

/// Boundary between orchestration and the thing that runs code.
pub trait CellExecutor {
    /// Run the request's target cell and return its outputs.
    ///
    /// May block the calling thread while code executes.
    ///
    /// # Errors
    ///
    /// Returns an error when the delegate cannot run the cell at all
    /// (spawn failure, timeout, lost connection). A Python exception inside
    /// the cell is not an error here: it comes back as an error *output*.
    fn execute(&mut self, request: &ExecuteRequest) -> Result<Vec<CellOutput>>;
}

/// Python driver: replays the cell prefix in one interpreter, compiling
/// each cell under its `<cell N>` pseudo-filename, and reports the outcome
/// as JSON. Each cell runs with its own stdout/stderr capture, so the
/// report carries only the streams of the last cell that ran — the target
/// on success, the failing cell on an exception. Frames from the driver
/// itself are filtered out of tracebacks.
const DRIVER: &str = r#"import io
import json
import sys
import traceback
from contextlib import redirect_stderr, redirect_stdout

with open(sys.argv[1]) as f:
    payload = json.load(f)

result = {"status": "ok", "stdout": "", "stderr": ""}
scope = {"__name__": "__main__"}
out, err = io.StringIO(), io.StringIO()
try:
    for cell in payload["cells"]:
        out, err = io.StringIO(), io.StringIO()
        with redirect_stdout(out), redirect_stderr(err):
            code = compile(cell["source"], "<cell %d>" % cell["index"], "exec")
            exec(code, scope)
except BaseException as exc:
    entries = traceback.format_exception(type(exc), exc, exc.__traceback__)
    entries = [e for e in entries if sys.argv[0] not in e]
    result.update(
        status="error",
        ename=type(exc).__name__,
        evalue=str(exc),
        traceback=entries,
    )

result["stdout"] = out.getvalue()
result["stderr"] = err.getvalue()
with open(sys.argv[2], "w") as f:
    json.dump(result, f)
"#;

#[derive(Debug, Deserialize)]
struct DriverReport {
    status: String,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    ename: Option<String>,
    #[serde(default)]
    evalue: Option<String>,
    #[serde(default)]
    traceback: Vec<String>,
}

/// Delegate that replays the cell prefix through a local `python3`.
///
/// Each run is a fresh interpreter: earlier cells re-execute to rebuild the
/// session state the target depends on. Stdout and stderr come back as
/// stream outputs; an uncaught exception comes back as an error output with
/// the `<cell N>` traceback the remapping path expects.
#[derive(Debug, Clone)]
pub struct LocalPythonExecutor {
    python: PathBuf,
}

impl Default for LocalPythonExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPythonExecutor {
    /// Delegate using `python3` from PATH.
    #[must_use]
    pub fn new() -> Self {
        Self {
            python: PathBuf::from("python3"),
        }
    }

    /// Delegate using a specific interpreter.
    #[must_use]
    pub fn with_interpreter(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }
}

impl CellExecutor for LocalPythonExecutor {
    fn execute(&mut self, request: &ExecuteRequest) -> Result<Vec<CellOutput>> {
        let dir = tempfile::tempdir()?;
        let driver_path = dir.path().join("driver.py");
        let payload_path = dir.path().join("cells.json");
        let result_path = dir.path().join("result.json");
        let stdout_path = dir.path().join("stdout");
        let stderr_path = dir.path().join("stderr");

        fs::write(&driver_path, DRIVER)?;
        let payload = serde_json::json!({
            "cells": request
                .cells
                .iter()
                .map(|(index, source)| serde_json::json!({ "index": index, "source": source }))
                .collect::<Vec<_>>(),
        });
        fs::write(&payload_path, serde_json::to_string(&payload)?)?;

        log::debug!(
            "running cell {:?} with a {}-cell prefix via {}",
            request.target_cell(),
            request.cells.len(),
            self.python.display()
        );

        let mut child = Command::new(&self.python)
            .arg(&driver_path)
            .arg(&payload_path)
            .arg(&result_path)
            .stdin(Stdio::null())
            .stdout(File::create(&stdout_path)?)
            .stderr(File::create(&stderr_path)?)
            .spawn()
            .map_err(|source| KernelError::SpawnFailed {
                program: self.python.clone(),
                source,
            })?;

        let status = match request.timeout {
            None => child.wait()?,
            Some(limit) => {
                let start = Instant::now();
                loop {
                    if let Some(status) = child.try_wait()? {
                        break status;
                    }
                    if start.elapsed() >= limit {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(KernelError::Timeout(limit.as_secs()));
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
            }
        };

        let report = fs::read_to_string(&result_path).map_err(|_| {
            let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
            let detail = if stderr.is_empty() {
                String::new()
            } else {
                format!(": {}", stderr.trim_end())
            };
            KernelError::ExecutionFailed(format!(
                "interpreter exited with {status} before reporting a result{detail}"
            ))
        })?;
        let report: DriverReport = serde_json::from_str(&report)?;

        // The driver captures streams per cell; the report carries only the
        // last cell's, so prefix prints never land on the target.
        let mut outputs = Vec::new();
        if !report.stdout.is_empty() {
            outputs.push(CellOutput::stream(report.stdout.clone()));
        }
        if !report.stderr.is_empty() {
            outputs.push(CellOutput::stderr(report.stderr.clone()));
        }
        if report.status == "error" {
            outputs.push(CellOutput::error(
                report.ename.unwrap_or_default(),
                report.evalue.unwrap_or_default(),
                report.traceback,
            ));
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbrun_core::OutputType;

    fn python_available() -> bool {
        Command::new("python3")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    #[test]
    fn test_target_cell_is_last_in_prefix() {
        let request = ExecuteRequest::new(vec![(0, "x = 1".into()), (2, "print(x)".into())]);
        assert_eq!(request.target_cell(), Some(2));
        assert_eq!(ExecuteRequest::new(vec![]).target_cell(), None);
    }

    #[test]
    fn test_execute_captures_stdout() {
        if !python_available() {
            return;
        }
        let mut executor = LocalPythonExecutor::new();
        let request = ExecuteRequest::new(vec![(0, "print('hello')".into())]);
        let outputs = executor.execute(&request).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].output_type, OutputType::Stream);
        assert_eq!(outputs[0].text.as_deref(), Some("hello\n"));
    }

    #[test]
    fn test_prefix_state_carries_across_cells() {
        if !python_available() {
            return;
        }
        let mut executor = LocalPythonExecutor::new();
        let request = ExecuteRequest::new(vec![
            (0, "x = 40".into()),
            (2, "x += 2".into()),
            (3, "print(x)".into()),
        ]);
        let outputs = executor.execute(&request).unwrap();
        assert_eq!(outputs[0].text.as_deref(), Some("42\n"));
    }

    #[test]
    fn test_prefix_prints_are_not_attributed_to_target() {
        if !python_available() {
            return;
        }
        let mut executor = LocalPythonExecutor::new();
        let request = ExecuteRequest::new(vec![
            (0, "print('from cell 0')".into()),
            (1, "print('target')".into()),
        ]);
        let outputs = executor.execute(&request).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].text.as_deref(), Some("target\n"));
    }

    #[test]
    fn test_stderr_comes_back_as_named_stream() {
        if !python_available() {
            return;
        }
        let mut executor = LocalPythonExecutor::new();
        let request = ExecuteRequest::new(vec![(
            0,
            "import sys\nsys.stderr.write('warning\\n')".into(),
        )]);
        let outputs = executor.execute(&request).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].output_type, OutputType::Stream);
        assert_eq!(outputs[0].name.as_deref(), Some("stderr"));
        assert_eq!(outputs[0].text.as_deref(), Some("warning\n"));
    }

    #[test]
    fn test_exception_becomes_error_output_with_cell_frame() {
        if !python_available() {
            return;
        }
        let mut executor = LocalPythonExecutor::new();
        let request =
            ExecuteRequest::new(vec![(0, "x = 1".into()), (1, "y = 2\n1 / 0".into())]);
        let outputs = executor.execute(&request).unwrap();

        let error = outputs
            .iter()
            .find(|o| o.output_type == OutputType::Error)
            .expect("error output");
        assert_eq!(error.ename.as_deref(), Some("ZeroDivisionError"));
        let traceback = error.traceback.join("");
        assert!(traceback.contains("<cell 1>"), "traceback: {traceback}");
        assert!(traceback.contains("line 2"), "traceback: {traceback}");
    }

    #[test]
    fn test_timeout_kills_the_interpreter() {
        if !python_available() {
            return;
        }
        let mut executor = LocalPythonExecutor::new();
        let request = ExecuteRequest::new(vec![(0, "import time\ntime.sleep(30)".into())])
            .with_timeout(Duration::from_secs(1));
        let err = executor.execute(&request).unwrap_err();
        assert!(matches!(err, KernelError::Timeout(1)));
    }

    #[test]
    fn test_missing_interpreter_is_spawn_error() {
        let mut executor = LocalPythonExecutor::with_interpreter("/no/such/python");
        let request = ExecuteRequest::new(vec![(0, "x = 1".into())]);
        let err = executor.execute(&request).unwrap_err();
        assert!(matches!(err, KernelError::SpawnFailed { .. }));
    }
}
