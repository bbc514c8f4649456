//! Manual removal of local staging directories (`coldstore clear-staging`).

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use crate::orchestrator::prune_empty_parents;

/// What is about to be deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    pub files: usize,
    pub dirs: usize,
}

/// A staging directory selected for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearRequest {
    pub path: PathBuf,
    /// Remove empty parents up to this root after deleting `path`
    pub prune_until: Option<PathBuf>,
    /// Top-level entries of `path` that survive; when non-empty `path` itself is kept
    pub keep: Vec<String>,
}

impl ClearRequest {
    /// One folder's staging copy, pruning empty parents up to `root`.
    pub fn folder(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prune_until: Some(root.into()),
            keep: Vec::new(),
        }
    }

    /// Everything below a staging root except the named entries.
    pub fn root(path: impl Into<PathBuf>, keep: &[&str]) -> Self {
        Self {
            path: path.into(),
            prune_until: None,
            keep: keep.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn keeps(&self, name: &OsStr) -> bool {
        self.keep.iter().any(|k| name == OsStr::new(k))
    }

    /// Files and directories that `clear` would delete (not counting `path` itself).
    pub fn stats(&self) -> DirStats {
        let mut stats = DirStats::default();
        let walker = WalkDir::new(&self.path)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && self.keeps(e.file_name())));
        for entry in walker.filter_map(|e| e.ok()) {
            if entry.file_type().is_dir() {
                stats.dirs += 1;
            } else {
                stats.files += 1;
            }
        }
        stats
    }

    /// Paths below `path` that `clear` leaves in place.
    pub fn kept_paths(&self) -> Vec<PathBuf> {
        self.keep
            .iter()
            .map(|k| self.path.join(k))
            .filter(|p| p.exists())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearResult {
    /// Nothing at the path
    Missing,
    Removed(DirStats),
}

/// Delete the requested directory and, for folder targets, its empty parents.
pub fn clear(request: &ClearRequest) -> Result<ClearResult> {
    if !request.path.exists() {
        info!(path = %request.path.display(), "Staging path does not exist, nothing to delete");
        return Ok(ClearResult::Missing);
    }
    let stats = request.stats();
    if request.keep.is_empty() {
        std::fs::remove_dir_all(&request.path)
            .with_context(|| format!("Failed to remove {}", request.path.display()))?;
    } else {
        remove_entries_except(request)?;
    }
    info!(
        path = %request.path.display(),
        files = stats.files,
        dirs = stats.dirs,
        kept = ?request.keep,
        "Removed staging directory"
    );
    if let Some(ref root) = request.prune_until {
        prune_empty_parents(&request.path, root);
    }
    Ok(ClearResult::Removed(stats))
}

fn remove_entries_except(request: &ClearRequest) -> Result<()> {
    let entries = std::fs::read_dir(&request.path)
        .with_context(|| format!("Failed to read {}", request.path.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read {}", request.path.display()))?;
        if request.keeps(&entry.file_name()) {
            continue;
        }
        let path = entry.path();
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}
