//! Content fingerprints: a CRC32 or SHA-256 digest of the bytes plus the byte length.
//!
//! Computed on demand for exactly one file at a time, reading in chunks so
//! large pak files never sit in memory. Which digest applies is decided by
//! the manifest entry: an 8-digit hex hash is CRC32, a 64-digit one SHA-256.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Digest used to fingerprint file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Crc32,
    Sha256,
}

impl HashAlgorithm {
    /// Pick the algorithm from the length of a hex digest, if it is one we know.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            8 => Some(HashAlgorithm::Crc32),
            64 => Some(HashAlgorithm::Sha256),
            _ => None,
        }
    }

    /// Length of this algorithm's digest in hex digits.
    pub fn hex_len(self) -> usize {
        match self {
            HashAlgorithm::Crc32 => 8,
            HashAlgorithm::Sha256 => 64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Crc32 => "crc32",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

enum Digester {
    Crc32(crc32fast::Hasher),
    Sha256(Sha256),
}

impl Digester {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Crc32 => Digester::Crc32(crc32fast::Hasher::new()),
            HashAlgorithm::Sha256 => Digester::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Crc32(h) => h.update(data),
            Digester::Sha256(h) => h.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Digester::Crc32(h) => format!("{:08x}", h.finalize()),
            Digester::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hash and size of a file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest.
    pub hash: String,
    pub size: u64,
}

impl Fingerprint {
    /// True if this fingerprint equals the expected hash (any hex case) and size.
    pub fn matches(&self, expected_hash: &str, expected_size: u64) -> bool {
        self.size == expected_size && self.hash.eq_ignore_ascii_case(expected_hash.trim())
    }
}

/// Compute the fingerprint of the file at `path` with the given algorithm.
pub fn fingerprint_path(path: &Path, algorithm: HashAlgorithm) -> io::Result<Fingerprint> {
    let mut f = File::open(path)?;
    let mut digest = Digester::new(algorithm);
    let mut buf = vec![0u8; BUF_SIZE];
    let mut size = 0u64;
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        digest.update(&buf[..n]);
        size += n as u64;
    }
    Ok(Fingerprint {
        algorithm,
        hash: digest.finish(),
        size,
    })
}

/// SHA-256 of an in-memory buffer as lowercase hex.
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// CRC32 of an in-memory buffer as 8 lowercase hex digits.
pub fn crc32_bytes(data: &[u8]) -> String {
    format!("{:08x}", crc32fast::hash(data))
}
