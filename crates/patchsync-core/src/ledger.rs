//! Patch ledger: every relative path this tool has ever installed.
//!
//! The ledger outlives manifest revisions. A file dropped from the manifest is
//! still on disk and still in the ledger, which is what lets a later clear
//! remove it without any network access. Entries are only ever added, except
//! by a full reset after a clear.
//!
//! Stored as JSON (`{"version": 1, "files": [...]}`) and rewritten through a
//! temp file + rename so a crash mid-save never truncates history.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{PatchError, PatchResult};

const LEDGER_VERSION: u32 = 1;

/// File whose exclusive lock guards mutations of the ledger at `ledger_path`
/// and of its install root: `<ledger>.lock`.
pub fn lock_path(ledger_path: &Path) -> PathBuf {
    let mut p = ledger_path.as_os_str().to_owned();
    p.push(".lock");
    PathBuf::from(p)
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedLedger {
    version: u32,
    files: Vec<String>,
}

/// In-memory ledger bound to its file.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    files: Vec<String>,
    index: HashSet<String>,
}

impl Ledger {
    /// Load from `path`. A missing file is an empty ledger; anything unreadable
    /// or unparsable is a fatal `PatchError::Ledger`.
    pub fn load(path: &Path) -> PatchResult<Self> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::empty(path));
            }
            Err(e) => return Err(PatchError::ledger(path, format!("read: {}", e))),
        };
        let persisted: PersistedLedger = serde_json::from_slice(&bytes)
            .map_err(|e| PatchError::ledger(path, format!("parse: {}", e)))?;
        if persisted.version != LEDGER_VERSION {
            return Err(PatchError::ledger(
                path,
                format!("unsupported version {}", persisted.version),
            ));
        }
        let mut ledger = Self::empty(path);
        for f in persisted.files {
            ledger.insert(f);
        }
        Ok(ledger)
    }

    fn empty(path: &Path) -> Self {
        Ledger {
            path: path.to_path_buf(),
            files: Vec::new(),
            index: HashSet::new(),
        }
    }

    fn insert(&mut self, rel: String) -> bool {
        if self.index.contains(&rel) {
            return false;
        }
        self.index.insert(rel.clone());
        self.files.push(rel);
        true
    }

    /// Add `rel` and persist. Saving happens even when the path was already
    /// recorded so the file on disk always reflects the latest install.
    pub fn record(&mut self, rel: &str) -> PatchResult<()> {
        if self.insert(rel.to_string()) {
            tracing::debug!(path = rel, "ledger: recorded");
        }
        self.save()
    }

    /// Forget every entry and persist the empty ledger.
    pub fn reset(&mut self) -> PatchResult<()> {
        self.files.clear();
        self.index.clear();
        self.save()
    }

    /// Write to disk via temp file + rename (creates parent dir if needed).
    pub fn save(&self) -> PatchResult<()> {
        let path = &self.path;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PatchError::ledger(path, format!("create dir {}: {}", parent.display(), e)))?;
        }
        let persisted = PersistedLedger {
            version: LEDGER_VERSION,
            files: self.files.clone(),
        };
        let json = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| PatchError::ledger(path, format!("serialize: {}", e)))?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(|e| PatchError::ledger(path, format!("write: {}", e)))?;
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            PatchError::ledger(path, format!("replace: {}", e))
        })?;
        Ok(())
    }

    /// Entries in first-install order.
    pub fn entries(&self) -> &[String] {
        &self.files
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.index.contains(rel)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
