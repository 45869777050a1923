//! Clear engine: remove every ledgered file from the install root.
//!
//! Works purely from the ledger, so files that later manifests dropped are
//! still removed and no network is needed. Per-file problems are collected,
//! never fatal; the ledger is reset once the pass is done.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{PatchError, PatchResult};
use crate::ledger::Ledger;
use crate::pipeline::FailedFile;
use crate::relpath;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClearOptions {
    /// Report what would be removed without touching disk or ledger.
    pub dry_run: bool,
    /// Remove directories left empty by the deletions (never the root itself).
    pub prune_empty_dirs: bool,
}

/// Outcome of a clear pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Removed (or, in a dry run, would be removed).
    pub deleted: Vec<String>,
    /// Ledgered but already gone from disk.
    pub missing: Vec<String>,
    pub failed: Vec<FailedFile>,
    pub pruned_dirs: Vec<PathBuf>,
    pub dry_run: bool,
}

impl ClearReport {
    /// `Err(PartialUninstall)` naming every file that could not be removed.
    pub fn ensure_complete(&self) -> PatchResult<()> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(PatchError::PartialUninstall {
                failed: self.failed.iter().map(|f| f.path.clone()).collect(),
            })
        }
    }
}

/// Delete every ledger entry under `root`, then reset the ledger.
///
/// Returns `Err` only if the reset ledger cannot be persisted.
pub fn clear(root: &Path, ledger: &mut Ledger, opts: ClearOptions) -> PatchResult<ClearReport> {
    let mut report = ClearReport {
        dry_run: opts.dry_run,
        ..ClearReport::default()
    };
    let mut touched_dirs: Vec<PathBuf> = Vec::new();

    for rel in ledger.entries() {
        let path = match relpath::join(root, rel) {
            Ok(p) => p,
            Err(problem) => {
                tracing::warn!(path = %rel, %problem, "refusing to delete unsafe ledger path");
                report.failed.push(FailedFile {
                    path: rel.clone(),
                    reason: PatchError::unsafe_path(rel, problem).to_string(),
                });
                continue;
            }
        };
        match std::fs::symlink_metadata(&path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                report.missing.push(rel.clone());
                continue;
            }
            Err(e) => {
                report.failed.push(failed(rel, &path, e));
                continue;
            }
            Ok(meta) if meta.is_dir() => {
                let e = io::Error::new(io::ErrorKind::Other, "is a directory");
                report.failed.push(failed(rel, &path, e));
                continue;
            }
            Ok(_) => {}
        }
        if opts.dry_run {
            report.deleted.push(rel.clone());
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %rel, "deleted");
                report.deleted.push(rel.clone());
                if let Some(parent) = path.parent() {
                    touched_dirs.push(parent.to_path_buf());
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.missing.push(rel.clone()),
            Err(e) => {
                tracing::warn!(path = %rel, "could not delete: {}", e);
                report.failed.push(failed(rel, &path, e));
            }
        }
    }

    if opts.dry_run {
        return Ok(report);
    }
    if opts.prune_empty_dirs {
        report.pruned_dirs = prune_empty(root, touched_dirs);
    }
    ledger.reset()?;
    tracing::info!(
        deleted = report.deleted.len(),
        missing = report.missing.len(),
        failed = report.failed.len(),
        "clear finished"
    );
    Ok(report)
}

fn failed(rel: &str, path: &Path, e: io::Error) -> FailedFile {
    FailedFile {
        path: rel.to_string(),
        reason: PatchError::fs(path, e).to_string(),
    }
}

/// Remove empty directories from each touched dir upward, stopping at the
/// first non-empty one and never removing `root`.
fn prune_empty(root: &Path, mut dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    dirs.sort();
    dirs.dedup();
    // Deepest first so children go before parents.
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    let mut pruned = Vec::new();
    for start in dirs {
        let mut dir = start.as_path();
        while dir != root && dir.starts_with(root) {
            match std::fs::remove_dir(dir) {
                Ok(()) => {
                    tracing::debug!(dir = %dir.display(), "pruned empty directory");
                    pruned.push(dir.to_path_buf());
                }
                // Not empty, already gone, or not ours to remove.
                Err(_) => break,
            }
            match dir.parent() {
                Some(p) => dir = p,
                None => break,
            }
        }
    }
    pruned
}
