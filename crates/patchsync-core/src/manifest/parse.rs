//! Parse manifest bodies (line-oriented text or a JSON array) into a Manifest.

use serde::Deserialize;

use super::{Manifest, ManifestEntry};
use crate::checksum::HashAlgorithm;
use crate::error::{PatchError, PatchResult};
use crate::relpath;

#[derive(Debug, Deserialize)]
struct JsonEntry {
    path: String,
    hash: String,
    size: u64,
}

/// Parse a manifest body. A body starting with `[` is read as a JSON array of
/// `{"path", "hash", "size"}` objects; anything else as text lines.
pub fn parse_manifest(body: &str) -> PatchResult<Manifest> {
    let trimmed = body.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('[') {
        let raw: Vec<JsonEntry> = serde_json::from_str(trimmed)
            .map_err(|e| PatchError::Manifest(format!("invalid JSON manifest: {}", e)))?;
        let listed = raw.len();
        let entries: Vec<ManifestEntry> = raw
            .into_iter()
            .filter_map(|j| checked_entry(&j.path, &j.hash, j.size, &j.path))
            .collect();
        return non_empty(listed, entries);
    }
    parse_text(trimmed)
}

/// Parse the text format: one `<relative/path> <hex-digest> <byte_size>` per
/// line, where the digest is 8 hex digits of CRC32 or 64 of SHA-256.
///
/// Blank lines and `#` comments are ignored. Malformed lines are logged and
/// skipped so one bad line never hides the rest of the manifest, but a body
/// whose every line is malformed is an error.
pub fn parse_text(body: &str) -> PatchResult<Manifest> {
    let mut listed = 0usize;
    let entries: Vec<ManifestEntry> = body
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            listed += 1;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != 3 {
                tracing::warn!("malformed manifest line: {:?}", line);
                return None;
            }
            let size = match parts[2].parse::<u64>() {
                Ok(n) => n,
                Err(_) => {
                    tracing::warn!("invalid size in manifest line: {:?}", line);
                    return None;
                }
            };
            checked_entry(parts[0], parts[1], size, line)
        })
        .collect();
    non_empty(listed, entries)
}

fn non_empty(listed: usize, entries: Vec<ManifestEntry>) -> PatchResult<Manifest> {
    if listed > 0 && entries.is_empty() {
        return Err(PatchError::Manifest(format!(
            "none of the {} manifest entries is valid",
            listed
        )));
    }
    Ok(Manifest::from_entries(entries))
}

fn checked_entry(path: &str, hash: &str, size: u64, context: &str) -> Option<ManifestEntry> {
    if let Err(problem) = relpath::validate(path) {
        tracing::warn!("unsafe path in manifest ({}): {:?}", problem, context);
        return None;
    }
    let algorithm = match HashAlgorithm::from_hex_len(hash.len()) {
        Some(a) if hash.bytes().all(|b| b.is_ascii_hexdigit()) => a,
        _ => {
            tracing::warn!("invalid hash in manifest: {:?}", context);
            return None;
        }
    };
    Some(ManifestEntry {
        relative_path: path.to_string(),
        expected_hash: hash.to_ascii_lowercase(),
        expected_size: size,
        algorithm,
    })
}
