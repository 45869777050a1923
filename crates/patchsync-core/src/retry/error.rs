//! Transfer error type for retry classification.

use std::fmt;

/// Error returned by a single file transfer attempt (curl failure, HTTP error,
/// short body, local write failure, fingerprint mismatch, or abort).
/// Classified for retry decisions before being surfaced as a `PatchError`.
#[derive(Debug)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Server closed the stream before the expected number of bytes arrived.
    PartialTransfer { expected: u64, received: u64 },
    /// Disk write to the temp file failed (disk full, permission denied). Not retried.
    Storage(std::io::Error),
    /// Body arrived complete but its fingerprint does not match the manifest.
    Mismatch { actual_hash: String, actual_size: u64 },
    /// The abort token was set while the transfer was running.
    Aborted,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "HTTP {}", code),
            FetchError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            FetchError::Storage(e) => write!(f, "storage: {}", e),
            FetchError::Mismatch {
                actual_hash,
                actual_size,
            } => write!(f, "fingerprint mismatch: got {} ({} bytes)", actual_hash, actual_size),
            FetchError::Aborted => write!(f, "transfer aborted"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Storage(e) => Some(e),
            FetchError::Http(_)
            | FetchError::PartialTransfer { .. }
            | FetchError::Mismatch { .. }
            | FetchError::Aborted => None,
        }
    }
}
