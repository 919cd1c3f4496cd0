//! Jupyter runtime-dir scanning.
//!
//! Running kernels leave `kernel-<id>.json` connection files in the Jupyter
//! runtime directory. Listing them newest-first is how a front end offers
//! "which kernel do you want to attach to" — the file's creation time is
//! the kernel's start time for display purposes. Whether a file's kernel is
//! still alive is not knowable from the file; a dead one surfaces when the
//! executor fails to reach it.

use crate::error::{KernelError, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// One discovered kernel connection file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelEntry {
    /// Kernel id (the `<id>` in `kernel-<id>.json`)
    pub id: String,
    /// Full path to the connection file
    pub path: PathBuf,
    /// File creation time, when the filesystem reports one
    pub created: Option<DateTime<Local>>,
}

/// Resolve the Jupyter runtime directory.
///
/// `JUPYTER_RUNTIME_DIR` wins when set; otherwise the platform default is
/// used (`~/.local/share/jupyter/runtime` on Linux, `~/Library/Jupyter/
/// runtime` on macOS, the data dir on Windows).
///
/// # Errors
///
/// Returns [`KernelError::RuntimeDirNotFound`] when no candidate directory
/// can be resolved.
pub fn runtime_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("JUPYTER_RUNTIME_DIR") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    #[cfg(target_os = "macos")]
    let base = dirs::home_dir().map(|h| h.join("Library").join("Jupyter"));
    #[cfg(not(target_os = "macos"))]
    let base = dirs::data_dir().map(|d| d.join("jupyter"));

    base.map(|b| b.join("runtime"))
        .ok_or(KernelError::RuntimeDirNotFound)
}

/// List kernel connection files in the runtime directory, newest first.
///
/// A missing runtime directory yields an empty list rather than an error:
/// it simply means no kernel has ever been started.
///
/// # Errors
///
/// Returns an error if the runtime directory cannot be resolved or read.
pub fn list_connection_files() -> Result<Vec<KernelEntry>> {
    let dir = runtime_dir()?;
    list_in(&dir)
}

fn list_in(dir: &Path) -> Result<Vec<KernelEntry>> {
    if !dir.is_dir() {
        log::debug!("runtime dir {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(id) = name
            .strip_prefix("kernel-")
            .and_then(|rest| rest.strip_suffix(".json"))
        else {
            continue;
        };

        let created = entry
            .metadata()
            .ok()
            .and_then(|m| m.created().or_else(|_| m.modified()).ok())
            .map(DateTime::<Local>::from);

        entries.push(KernelEntry {
            id: id.to_string(),
            path: entry.path(),
            created,
        });
    }

    entries.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
    log::debug!("found {} connection files in {}", entries.len(), dir.display());
    Ok(entries)
}
