//! [`ProcessSource`] backed by the `/proc` filesystem.

use crate::instance::ProcessId;
use crate::traits::ProcessSource;
use std::path::{Path, PathBuf};

/// Errors that can occur while reading `/proc`.
#[derive(Debug, thiserror::Error)]
#[error("procfs error: {0}")]
pub struct ProcError(String);

/// Reads process ids and command lines from a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcFs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

/// Split a NUL-separated `cmdline` blob into arguments.
fn split_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

impl ProcessSource for ProcFs {
    type Error = ProcError;

    fn processes(&self) -> Result<Vec<ProcessId>, ProcError> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| ProcError(format!("read {}: {}", self.root.display(), e)))?;
        Ok(entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .map(ProcessId)
            .collect())
    }

    /// Kernel threads and processes that exited in between report an empty
    /// argument vector or an error; both are fine for the caller.
    fn arguments(&self, pid: ProcessId) -> Result<Vec<String>, ProcError> {
        let path = self.root.join(pid.0.to_string()).join("cmdline");
        let raw = std::fs::read(&path)
            .map_err(|e| ProcError(format!("read {}: {}", path.display(), e)))?;
        Ok(split_cmdline(&raw))
    }
}
