//! Local inventory: fingerprints one manifest-referenced path at a time.
//!
//! Nothing here walks the install tree; files the manifest does not mention
//! are never opened.

use std::io;
use std::path::Path;

use crate::checksum::{self, Fingerprint, HashAlgorithm};
use crate::error::{PatchError, PatchResult};
use crate::relpath;

/// Fingerprint of a local file, recomputed on every check and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRecord {
    pub relative_path: String,
    pub fingerprint: Fingerprint,
}

impl LocalFileRecord {
    pub fn actual_hash(&self) -> &str {
        &self.fingerprint.hash
    }

    pub fn actual_size(&self) -> u64 {
        self.fingerprint.size
    }
}

/// Size of the regular file at `root/rel`, or `None` if nothing is there.
/// A directory or other non-file at that path is reported as an error.
pub fn stat(root: &Path, rel: &str) -> PatchResult<Option<u64>> {
    let path = relpath::join(root, rel).map_err(|p| PatchError::unsafe_path(rel, p))?;
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Err(PatchError::fs(
            path,
            io::Error::new(io::ErrorKind::Other, "not a regular file"),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PatchError::fs(path, e)),
    }
}

/// Fingerprint `root/rel` with `algorithm`, or `None` if the file does not exist.
pub fn fingerprint(
    root: &Path,
    rel: &str,
    algorithm: HashAlgorithm,
) -> PatchResult<Option<LocalFileRecord>> {
    if stat(root, rel)?.is_none() {
        return Ok(None);
    }
    let path = relpath::join(root, rel).map_err(|p| PatchError::unsafe_path(rel, p))?;
    let fp = match checksum::fingerprint_path(&path, algorithm) {
        Ok(fp) => fp,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PatchError::fs(path, e)),
    };
    Ok(Some(LocalFileRecord {
        relative_path: rel.to_string(),
        fingerprint: fp,
    }))
}
