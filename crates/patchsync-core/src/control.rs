//! Operation control: abort tokens and the "operation in progress" gate.
//!
//! An `AbortToken` is shared between the UI layer and a running check or
//! patch; the transfer loop polls it and stops. The `OperationGate` keeps the
//! pipeline and the clear engine from touching the install directory and the
//! ledger at the same time, within one process through an atomic flag and
//! across processes through an exclusive lock on a file next to the ledger.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fs2::FileExt;

use crate::error::PatchError;

/// Cloneable cancellation flag. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct AbortToken(Arc<AtomicBool>);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The active transfer stops at its next write.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(PatchError::Cancelled)` once abort has been requested.
    pub fn check(&self) -> Result<(), PatchError> {
        if self.is_aborted() {
            Err(PatchError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Mutual exclusion for operations that mutate the install dir or the ledger.
#[derive(Debug, Clone, Default)]
pub struct OperationGate {
    busy: Arc<AtomicBool>,
    lock_path: Option<PathBuf>,
}

impl OperationGate {
    /// Gate that only excludes operations within this process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate that also holds an exclusive lock on `lock_path` while taken, so
    /// a second process using the same file is refused too.
    pub fn with_lock_file(lock_path: impl Into<PathBuf>) -> Self {
        Self {
            busy: Arc::default(),
            lock_path: Some(lock_path.into()),
        }
    }

    pub fn lock_path(&self) -> Option<&Path> {
        self.lock_path.as_deref()
    }

    /// Take the gate, or fail with `PatchError::Busy` if another operation has it.
    pub fn acquire(&self) -> Result<OperationGuard, PatchError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PatchError::Busy)?;
        let mut guard = OperationGuard {
            busy: Arc::clone(&self.busy),
            lock: None,
        };
        if let Some(path) = &self.lock_path {
            // Dropping `guard` on error resets the flag.
            guard.lock = Some(lock_exclusive(path)?);
        }
        Ok(guard)
    }

    /// True if an operation holds the gate here or in another process.
    pub fn is_busy(&self) -> bool {
        if self.busy.load(Ordering::Acquire) {
            return true;
        }
        match &self.lock_path {
            Some(path) => held_elsewhere(path),
            None => false,
        }
    }
}

fn lock_exclusive(path: &Path) -> Result<File, PatchError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PatchError::fs(parent, e))?;
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| PatchError::fs(path, e))?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if is_contended(&e) => {
            tracing::debug!(lock = %path.display(), "operation lock held by another process");
            Err(PatchError::Busy)
        }
        Err(e) => Err(PatchError::fs(path, e)),
    }
}

/// Probe the lock file without creating it; the lock is released when the
/// handle drops at the end of the call.
fn held_elsewhere(path: &Path) -> bool {
    let file = match OpenOptions::new().read(true).open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    matches!(file.try_lock_exclusive(), Err(e) if is_contended(&e))
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == fs2::lock_contended_error().kind()
}

/// Releases the gate when dropped.
#[derive(Debug)]
pub struct OperationGuard {
    busy: Arc<AtomicBool>,
    lock: Option<File>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        // Closing the handle releases the file lock.
        self.lock.take();
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_token_is_shared_between_clones() {
        let a = AbortToken::new();
        let b = a.clone();
        assert!(a.check().is_ok());
        b.abort();
        assert!(a.is_aborted());
        assert!(matches!(a.check(), Err(PatchError::Cancelled)));
    }

    #[test]
    fn gate_excludes_second_operation_until_guard_drops() {
        let gate = OperationGate::new();
        let guard = gate.acquire().unwrap();
        assert!(gate.is_busy());
        assert!(matches!(gate.clone().acquire(), Err(PatchError::Busy)));
        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.acquire().is_ok());
    }

    #[test]
    fn lock_file_excludes_independent_gates() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("state/ledger.json.lock");
        let first = OperationGate::with_lock_file(&lock);
        let second = OperationGate::with_lock_file(&lock);

        let guard = first.acquire().unwrap();
        assert!(lock.exists());
        assert!(second.is_busy());
        assert!(matches!(second.acquire(), Err(PatchError::Busy)));
        // A refused acquire leaves the second gate's own flag clear.
        assert!(!second.busy.load(Ordering::Acquire));

        drop(guard);
        assert!(!first.is_busy());
        assert!(!second.is_busy());
        let _held = second.acquire().unwrap();
        assert!(first.is_busy());
    }

    #[test]
    fn missing_lock_file_is_not_busy() {
        let dir = tempfile::tempdir().unwrap();
        let gate = OperationGate::with_lock_file(dir.path().join("none/x.lock"));
        assert!(!gate.is_busy());
        assert!(!dir.path().join("none").exists());
    }
}
