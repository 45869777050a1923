//! Diff planner: manifest + on-demand local fingerprints → ordered action plan.
//!
//! One action per manifest entry, in manifest order. Size is checked first
//! from file metadata; the file is only hashed when the size already matches.
//! Local files the manifest does not list are never looked at.

use std::path::Path;

use crate::control::AbortToken;
use crate::error::PatchResult;
use crate::inventory;
use crate::manifest::{Manifest, ManifestEntry};

/// Why a file needs to be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchReason {
    Missing,
    SizeMismatch { local: u64 },
    HashMismatch { local: String },
    /// Something is at the path but it could not be fingerprinted.
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchAction {
    /// Local file already matches the manifest.
    Skip(String),
    /// Download and install this entry.
    Fetch { entry: ManifestEntry, reason: FetchReason },
}

impl PatchAction {
    pub fn relative_path(&self) -> &str {
        match self {
            PatchAction::Skip(p) => p,
            PatchAction::Fetch { entry, .. } => &entry.relative_path,
        }
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, PatchAction::Fetch { .. })
    }
}

/// Ordered actions for one planning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchPlan {
    actions: Vec<PatchAction>,
}

impl PatchPlan {
    pub fn actions(&self) -> &[PatchAction] {
        &self.actions
    }

    /// Entries to download, in plan order.
    pub fn fetches(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.actions.iter().filter_map(|a| match a {
            PatchAction::Fetch { entry, .. } => Some(entry),
            PatchAction::Skip(_) => None,
        })
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches().count()
    }

    pub fn skip_count(&self) -> usize {
        self.actions.len() - self.fetch_count()
    }

    /// Bytes the pipeline will download if every fetch succeeds first time.
    pub fn fetch_bytes(&self) -> u64 {
        self.fetches().map(|e| e.expected_size).sum()
    }

    pub fn is_up_to_date(&self) -> bool {
        self.fetch_count() == 0
    }
}

/// Decide Skip or Fetch for a single entry.
pub fn plan_entry(root: &Path, entry: &ManifestEntry) -> PatchAction {
    let rel = &entry.relative_path;
    let fetch = |reason: FetchReason| {
        tracing::debug!(path = %rel, ?reason, "outdated");
        PatchAction::Fetch {
            entry: entry.clone(),
            reason,
        }
    };

    match inventory::stat(root, rel) {
        Ok(None) => return fetch(FetchReason::Missing),
        Ok(Some(size)) if size != entry.expected_size => {
            return fetch(FetchReason::SizeMismatch { local: size })
        }
        Ok(Some(_)) => {}
        Err(e) => {
            tracing::warn!(path = %rel, "could not stat local file: {}", e);
            return fetch(FetchReason::Unreadable(e.to_string()));
        }
    }

    match inventory::fingerprint(root, rel, entry.algorithm) {
        Ok(Some(rec)) if rec.actual_size() != entry.expected_size => {
            fetch(FetchReason::SizeMismatch { local: rec.actual_size() })
        }
        Ok(Some(rec)) if !entry.accepts(&rec.fingerprint) => fetch(FetchReason::HashMismatch {
            local: rec.fingerprint.hash,
        }),
        Ok(Some(_)) => PatchAction::Skip(rel.clone()),
        Ok(None) => fetch(FetchReason::Missing),
        Err(e) => {
            tracing::warn!(path = %rel, "could not fingerprint local file: {}", e);
            fetch(FetchReason::Unreadable(e.to_string()))
        }
    }
}

/// Build the plan for `manifest` against the tree at `root`.
///
/// Checks `abort` between entries; a cancelled plan is an error rather than a
/// truncated plan.
pub fn plan(manifest: &Manifest, root: &Path, abort: &AbortToken) -> PatchResult<PatchPlan> {
    let mut actions = Vec::with_capacity(manifest.len());
    for entry in manifest {
        abort.check()?;
        actions.push(plan_entry(root, entry));
    }
    let plan = PatchPlan { actions };
    tracing::info!(
        total = manifest.len(),
        fetch = plan.fetch_count(),
        bytes = plan.fetch_bytes(),
        "plan ready"
    );
    Ok(plan)
}
