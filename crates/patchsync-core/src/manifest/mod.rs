//! Remote patch manifest: the authoritative list of files the install must contain.

mod parse;

use std::collections::HashMap;

use crate::checksum::{Fingerprint, HashAlgorithm};
use crate::error::{PatchError, PatchResult};
use crate::remote::Remote;

pub use parse::{parse_manifest, parse_text};

/// One file the remote manifest says must exist locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// `/`-separated path under the install root.
    pub relative_path: String,
    /// Lowercase hex digest of the expected content.
    pub expected_hash: String,
    pub expected_size: u64,
    /// Digest `expected_hash` was computed with; follows from its length.
    pub algorithm: HashAlgorithm,
}

impl ManifestEntry {
    /// True if `fp` was taken with this entry's algorithm and equals its hash and size.
    pub fn accepts(&self, fp: &Fingerprint) -> bool {
        fp.algorithm == self.algorithm && fp.matches(&self.expected_hash, self.expected_size)
    }
}

/// Ordered set of entries, unique by `relative_path`, in remote order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build from entries in remote order. A repeated path keeps its first
    /// position but takes the later hash and size.
    pub fn from_entries(entries: impl IntoIterator<Item = ManifestEntry>) -> Self {
        let mut out: Vec<ManifestEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for entry in entries {
            match index.get(&entry.relative_path) {
                Some(&i) => {
                    tracing::warn!(path = %entry.relative_path, "duplicate manifest entry; later line wins");
                    out[i] = entry;
                }
                None => {
                    index.insert(entry.relative_path.clone(), out.len());
                    out.push(entry);
                }
            }
        }
        Manifest { entries: out }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ManifestEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, relative_path: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.relative_path == relative_path)
    }

    /// Sum of all expected sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.expected_size).sum()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Fetch and parse the manifest. Any failure leaves local state untouched.
pub fn fetch(remote: &dyn Remote) -> PatchResult<Manifest> {
    let body = remote.fetch_manifest().map_err(|source| PatchError::Network {
        target: remote.manifest_location(),
        source,
    })?;
    let text = String::from_utf8(body)
        .map_err(|e| PatchError::Manifest(format!("body is not UTF-8: {}", e)))?;
    let manifest = parse_manifest(&text)?;
    tracing::info!(files = manifest.len(), bytes = manifest.total_size(), "manifest loaded");
    Ok(manifest)
}
