//! Checksum command: print the manifest fingerprint of a file.

use anyhow::{Context, Result};
use patchsync_core::checksum::{self, HashAlgorithm};
use std::path::Path;

/// Print `<hash> <size>  <path>` for the given file; the hash is SHA-256 unless `crc32`.
pub async fn run_checksum(path: &Path, crc32: bool) -> Result<()> {
    let algorithm = if crc32 { HashAlgorithm::Crc32 } else { HashAlgorithm::Sha256 };
    let fp = checksum::fingerprint_path(path, algorithm).with_context(|| format!("read {}", path.display()))?;
    println!("{} {}  {}", fp.hash, fp.size, path.display());
    Ok(())
}
