//! Error taxonomy for the patch engine.
//!
//! Per-file failures inside a batch are collected into reports instead of
//! being returned; the variants here surface either as the reason recorded for
//! one file or as the error that stops an entire operation.

use std::path::PathBuf;
use thiserror::Error;

use crate::relpath::RelPathProblem;
use crate::retry::FetchError;

pub type PatchResult<T> = Result<T, PatchError>;

#[derive(Debug, Error)]
pub enum PatchError {
    /// Manifest or file endpoint unreachable, timed out, or answered non-2xx.
    #[error("network error for {target}: {source}")]
    Network {
        target: String,
        #[source]
        source: FetchError,
    },

    /// Downloaded bytes do not match the manifest fingerprint.
    #[error(
        "integrity check failed for {path}: expected {expected_hash} ({expected_size} bytes), got {actual_hash} ({actual_size} bytes)"
    )]
    Integrity {
        path: String,
        expected_hash: String,
        expected_size: u64,
        actual_hash: String,
        actual_size: u64,
    },

    /// Local disk problem (permissions, disk full, missing executable).
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more ledgered files could not be deleted.
    #[error("uninstall incomplete: {} file(s) could not be removed", failed.len())]
    PartialUninstall { failed: Vec<String> },

    /// The ledger could not be read or written. Always fatal.
    #[error("ledger {} unusable: {reason}", path.display())]
    Ledger { path: PathBuf, reason: String },

    /// The manifest body could not be decoded.
    #[error("manifest unreadable: {0}")]
    Manifest(String),

    /// Configuration value the engine cannot work with (e.g. a bad base URL).
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsafe relative path {path:?}: {problem}")]
    UnsafePath { path: String, problem: RelPathProblem },

    /// Another patch or clear operation holds the operation gate.
    #[error("another operation is already in progress")]
    Busy,

    #[error("operation cancelled")]
    Cancelled,
}

impl PatchError {
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PatchError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn ledger(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        PatchError::Ledger {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unsafe_path(path: &str, problem: RelPathProblem) -> Self {
        PatchError::UnsafePath {
            path: path.to_string(),
            problem,
        }
    }

    /// Errors that must stop the whole operation rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PatchError::Ledger { .. } | PatchError::Cancelled | PatchError::Busy
        )
    }
}
