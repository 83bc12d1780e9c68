//! Report sink and publish gate.
//!
//! Every file the runner writes goes through a `PublishGate` first. The
//! default `RootWritePolicy` keeps the workspace root clean:
//! - nothing is written directly in the root except `BOOTSTRAP_EXPORT.txt`
//! - agent identity files (`AGENTS`, `SOUL`, ...) are never written there,
//!   matched by file name or stem, case-insensitively
//!
//! A `ReportSink` receives finished backtests; `DirectorySink` writes the
//! JSON result and the canonical dataset CSV side by side.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::export::{export_dataset_csv, export_json};
use crate::runner::BacktestResult;

/// The one file allowed directly in the workspace root.
pub const ROOT_EXPORT_FILE: &str = "BOOTSTRAP_EXPORT.txt";

pub const IDENTITY_FILE_STEMS: [&str; 7] = [
    "AGENTS",
    "BOOTSTRAP",
    "IDENTITY",
    "SOUL",
    "TOOLS",
    "USER",
    "HEARTBEAT",
];

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write blocked for {path}: {reason}")]
    Blocked { path: String, reason: String },
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Export(#[from] anyhow::Error),
}

/// Decides whether a path may be written.
pub trait PublishGate: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, path: &Path) -> Result<(), SinkError>;
}

/// Blocks root-level writes and identity files in the workspace root.
#[derive(Debug, Clone)]
pub struct RootWritePolicy {
    root: PathBuf,
}

impl RootWritePolicy {
    pub fn new(root: &Path) -> Self {
        Self {
            root: resolve(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PublishGate for RootWritePolicy {
    fn name(&self) -> &str {
        "root_write_policy"
    }

    fn check(&self, path: &Path) -> Result<(), SinkError> {
        let target = resolve(path);
        if target.parent() != Some(self.root.as_path()) {
            return Ok(());
        }
        let blocked = |reason: &str| SinkError::Blocked {
            path: target.display().to_string(),
            reason: reason.to_string(),
        };
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_uppercase())
            .unwrap_or_default();
        let stem = target
            .file_stem()
            .map(|n| n.to_string_lossy().to_uppercase())
            .unwrap_or_default();
        if IDENTITY_FILE_STEMS
            .iter()
            .any(|id| *id == name || *id == stem)
        {
            return Err(blocked("identity files in the workspace root are protected"));
        }
        if target.file_name().and_then(|n| n.to_str()) != Some(ROOT_EXPORT_FILE) {
            return Err(blocked(&format!(
                "only {ROOT_EXPORT_FILE} may be written in the workspace root"
            )));
        }
        Ok(())
    }
}

/// Canonical form of `path`. Existing paths (or an existing parent) are
/// canonicalized; anything else is made absolute and normalized lexically.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Ok(p) = parent.canonicalize() {
            return p.join(name);
        }
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Check `path` against `gate`, create its parent and write `contents`.
pub fn write_gated(gate: &dyn PublishGate, path: &Path, contents: &str) -> Result<(), SinkError> {
    gate.check(path)?;
    let io = |source| SinkError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    std::fs::write(path, contents).map_err(io)?;
    tracing::debug!(path = %path.display(), gate = gate.name(), "wrote file");
    Ok(())
}

/// Destination for finished backtests.
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &str;

    /// Persist `result`; returns the paths written.
    fn publish(&self, result: &BacktestResult) -> Result<Vec<PathBuf>, SinkError>;
}

/// Writes `<slug>.json` and `<slug>.csv` under one directory.
pub struct DirectorySink {
    dir: PathBuf,
    gate: Box<dyn PublishGate>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, gate: Box<dyn PublishGate>) -> Self {
        Self {
            dir: dir.into(),
            gate,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl std::fmt::Debug for DirectorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorySink")
            .field("dir", &self.dir)
            .field("gate", &self.gate.name())
            .finish()
    }
}

impl ReportSink for DirectorySink {
    fn name(&self) -> &str {
        "directory"
    }

    fn publish(&self, result: &BacktestResult) -> Result<Vec<PathBuf>, SinkError> {
        let json_path = self.dir.join(format!("{}.json", result.slug));
        let csv_path = self.dir.join(format!("{}.csv", result.slug));
        // Check both targets before writing either.
        self.gate.check(&json_path)?;
        self.gate.check(&csv_path)?;

        write_gated(self.gate.as_ref(), &json_path, &export_json(result)?)?;
        write_gated(self.gate.as_ref(), &csv_path, &export_dataset_csv(&result.dataset)?)?;
        tracing::info!(dir = %self.dir.display(), slug = %result.slug, "published report");
        Ok(vec![json_path, csv_path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_writes_are_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let gate = RootWritePolicy::new(dir.path());
        let err = gate.check(&dir.path().join("report.csv")).unwrap_err();
        assert!(err.to_string().contains("only BOOTSTRAP_EXPORT.txt"));
        assert!(gate.check(&dir.path().join(ROOT_EXPORT_FILE)).is_ok());
    }

    #[test]
    fn nested_writes_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let gate = RootWritePolicy::new(dir.path());
        assert!(gate.check(&dir.path().join("outputs/capital/runs/x.csv")).is_ok());
        assert!(gate.check(&dir.path().join("outputs/SOUL.md")).is_ok());
    }

    #[test]
    fn identity_files_match_by_stem_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let gate = RootWritePolicy::new(dir.path());
        for name in ["soul.md", "AGENTS", "Heartbeat.txt", "user.json"] {
            let err = gate.check(&dir.path().join(name)).unwrap_err();
            assert!(err.to_string().contains("identity"), "{name}");
        }
    }

    #[test]
    fn dot_segments_are_resolved() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("outputs")).unwrap();
        let gate = RootWritePolicy::new(dir.path());
        let sneaky = dir.path().join("outputs").join("..").join("notes.txt");
        assert!(gate.check(&sneaky).is_err());
    }

    #[test]
    fn write_gated_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let gate = RootWritePolicy::new(dir.path());
        let path = dir.path().join("a/b/c.txt");
        write_gated(&gate, &path, "hello").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
        assert!(write_gated(&gate, &dir.path().join("c.txt"), "x").is_err());
    }
}
