//! Fetch & install pipeline: consumes a plan's Fetch actions one at a time.
//!
//! Per file: validate the path, clear any stale `.part`, stream into a fresh
//! `.part`, sync, fingerprint, rename over the destination, then append to
//! the ledger. A file that still fails after the retry policy is recorded in
//! the report and the batch moves on. Only a ledger failure or cancellation
//! stops the batch.

mod progress;
mod report;

use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::checksum;
use crate::control::AbortToken;
use crate::error::{PatchError, PatchResult};
use crate::ledger::Ledger;
use crate::manifest::ManifestEntry;
use crate::planner::PatchPlan;
use crate::relpath;
use crate::remote::Remote;
use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use crate::storage::{self, PartFile};

pub use progress::{ProgressEvent, Stage};
pub use report::{BatchReport, FailedFile};

use progress::ProgressTracker;

/// One sequential patch run against an install root.
pub struct Pipeline<'a> {
    remote: &'a dyn Remote,
    root: PathBuf,
    policy: RetryPolicy,
    progress: Option<mpsc::Sender<ProgressEvent>>,
    abort: AbortToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(remote: &'a dyn Remote, root: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            root: root.into(),
            policy: RetryPolicy::default(),
            progress: None,
            abort: AbortToken::new(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_abort(mut self, abort: AbortToken) -> Self {
        self.abort = abort;
        self
    }

    /// Install every Fetch action in `plan`, in order.
    ///
    /// Returns `Err` only for fatal conditions (ledger unusable). Per-file
    /// failures and cancellation are reported in the `BatchReport`.
    pub fn run(&self, plan: &PatchPlan, ledger: &mut Ledger) -> PatchResult<BatchReport> {
        let fetches: Vec<&ManifestEntry> = plan.fetches().collect();
        let mut tracker = ProgressTracker::new(self.progress.clone(), fetches.len(), plan.fetch_bytes());
        let mut report = BatchReport::default();
        tracing::info!(files = fetches.len(), bytes = plan.fetch_bytes(), root = %self.root.display(), "patch batch starting");

        for (i, entry) in fetches.iter().enumerate() {
            if self.abort.is_aborted() {
                report.cancelled = true;
                break;
            }
            let rel = entry.relative_path.as_str();
            tracker.begin_file(rel, i + 1, entry.expected_size);
            match self.install(entry, &mut tracker) {
                Ok(()) => {
                    ledger.record(rel)?;
                    tracker.finish_file(Stage::Installed);
                    report.installed.push(rel.to_string());
                    report.bytes_installed += entry.expected_size;
                    tracing::info!(path = rel, bytes = entry.expected_size, "installed");
                }
                Err(PatchError::Cancelled) => {
                    tracker.finish_file(Stage::Failed);
                    report.cancelled = true;
                    tracing::info!(path = rel, "cancelled mid-transfer");
                    break;
                }
                Err(e) => {
                    tracker.finish_file(Stage::Failed);
                    tracing::warn!(path = rel, "file failed: {}", e);
                    report.fail(rel, &e);
                }
            }
        }

        tracing::info!(
            installed = report.installed.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "patch batch finished"
        );
        Ok(report)
    }

    fn install(&self, entry: &ManifestEntry, tracker: &mut ProgressTracker) -> PatchResult<()> {
        let rel = &entry.relative_path;
        let dest = relpath::join(&self.root, rel).map_err(|p| PatchError::unsafe_path(rel, p))?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PatchError::fs(parent, e))?;
        }
        match storage::remove_stale(&dest) {
            Ok(true) => tracing::warn!(path = %rel, "removed temp file left by an interrupted transfer"),
            Ok(false) => {}
            Err(e) => return Err(PatchError::fs(storage::temp_path(&dest), e)),
        }

        let result = run_with_retry(&self.policy, &self.abort, |attempt| {
            if attempt > 1 {
                tracker.restart_file();
            }
            self.attempt(entry, &dest, tracker)
        });

        result.map_err(|e| match e {
            FetchError::Aborted => PatchError::Cancelled,
            FetchError::Mismatch {
                actual_hash,
                actual_size,
            } => PatchError::Integrity {
                path: rel.clone(),
                expected_hash: entry.expected_hash.clone(),
                expected_size: entry.expected_size,
                actual_hash,
                actual_size,
            },
            FetchError::Storage(source) => PatchError::fs(dest.clone(), source),
            other => PatchError::Network {
                target: rel.clone(),
                source: other,
            },
        })
    }

    /// One download attempt into a fresh temp file. The temp file is removed
    /// on every error path when `part` drops.
    fn attempt(&self, entry: &ManifestEntry, dest: &Path, tracker: &mut ProgressTracker) -> Result<(), FetchError> {
        let mut part = PartFile::create(dest).map_err(FetchError::Storage)?;
        let received = {
            let mut sink = |chunk: &[u8]| -> io::Result<()> {
                part.write_chunk(chunk)?;
                tracker.add_bytes(chunk.len() as u64);
                Ok(())
            };
            self.remote.stream_file(&entry.relative_path, &mut sink, &self.abort)?
        };
        part.sync().map_err(FetchError::Storage)?;
        if received < entry.expected_size {
            return Err(FetchError::PartialTransfer {
                expected: entry.expected_size,
                received,
            });
        }

        tracker.verifying();
        let fp = checksum::fingerprint_path(part.temp_path(), entry.algorithm).map_err(FetchError::Storage)?;
        if !entry.accepts(&fp) {
            tracing::warn!(path = %entry.relative_path, actual = %fp.hash, size = fp.size, "integrity mismatch");
            return Err(FetchError::Mismatch {
                actual_hash: fp.hash,
                actual_size: fp.size,
            });
        }
        if self.abort.is_aborted() {
            return Err(FetchError::Aborted);
        }
        part.finalize(dest).map_err(FetchError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::checksum::{crc32_bytes, sha256_bytes, HashAlgorithm};
    use crate::manifest::Manifest;
    use crate::planner;
    use crate::remote::fake::{FakeRemote, Served};

    fn entry(path: &str, body: &[u8]) -> ManifestEntry {
        ManifestEntry {
            relative_path: path.to_string(),
            expected_hash: sha256_bytes(body),
            expected_size: body.len() as u64,
            algorithm: HashAlgorithm::Sha256,
        }
    }

    fn crc_entry(path: &str, body: &[u8]) -> ManifestEntry {
        ManifestEntry {
            relative_path: path.to_string(),
            expected_hash: crc32_bytes(body),
            expected_size: body.len() as u64,
            algorithm: HashAlgorithm::Crc32,
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn plan_for(root: &Path, entries: Vec<ManifestEntry>) -> PatchPlan {
        planner::plan(&Manifest::from_entries(entries), root, &AbortToken::new()).unwrap()
    }

    #[test]
    fn installs_fetches_and_records_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("game");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.pak"), b"same").unwrap();
        let remote = FakeRemote::new()
            .body("a.pak", b"same")
            .body("Mist/Content/b.pak", b"brand new file");
        let plan = plan_for(&root, vec![entry("a.pak", b"same"), entry("Mist/Content/b.pak", b"brand new file")]);
        let mut ledger = Ledger::load(&dir.path().join("ledger.json")).unwrap();

        let report = Pipeline::new(&remote, &root).run(&plan, &mut ledger).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.installed, ["Mist/Content/b.pak"]);
        assert_eq!(report.bytes_installed, 14);
        assert_eq!(std::fs::read(root.join("Mist/Content/b.pak")).unwrap(), b"brand new file");
        assert_eq!(remote.requests(), ["Mist/Content/b.pak"]);
        assert_eq!(ledger.entries(), ["Mist/Content/b.pak"]);
        assert!(!storage::temp_path(&root.join("Mist/Content/b.pak")).exists());
    }

    #[test]
    fn failure_is_isolated_and_not_ledgered() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new()
            .serve("a.pak", Served::Status(404))
            .body("b.pak", b"bbbb");
        let plan = plan_for(dir.path(), vec![entry("a.pak", b"aaaa"), entry("b.pak", b"bbbb")]);
        let mut ledger = Ledger::load(&dir.path().join("ledger.json")).unwrap();

        let report = Pipeline::new(&remote, dir.path())
            .with_retry_policy(quick_retry())
            .run(&plan, &mut ledger)
            .unwrap();

        assert_eq!(report.installed, ["b.pak"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, "a.pak");
        assert!(report.failed[0].reason.contains("HTTP 404"));
        assert!(!ledger.contains("a.pak"));
        assert!(!dir.path().join("a.pak").exists());
        // 4xx is not retried.
        assert_eq!(remote.requests(), ["a.pak", "b.pak"]);
    }

    #[test]
    fn integrity_mismatch_is_retried_once_then_reported() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new().body("b.pak", b"corrupted!");
        let plan = plan_for(dir.path(), vec![entry("b.pak", b"good bytes")]);
        let mut ledger = Ledger::load(&dir.path().join("ledger.json")).unwrap();

        let report = Pipeline::new(&remote, dir.path())
            .with_retry_policy(quick_retry())
            .run(&plan, &mut ledger)
            .unwrap();

        assert!(report.installed.is_empty());
        assert!(report.failed[0].reason.contains("integrity check failed"));
        assert_eq!(remote.requests().len(), 2);
        assert!(!dir.path().join("b.pak").exists());
        assert!(!dir.path().join("b.pak.part").exists());
        assert!(ledger.is_empty());
    }

    #[test]
    fn crc32_entries_verify_by_crc32() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new()
            .body("Mist/Paks/good.pak", b"pak bytes")
            .body("Mist/Paks/bad.pak", b"pak bytez");
        let plan = plan_for(
            dir.path(),
            vec![crc_entry("Mist/Paks/good.pak", b"pak bytes"), crc_entry("Mist/Paks/bad.pak", b"pak bytes")],
        );
        let mut ledger = Ledger::load(&dir.path().join("ledger.json")).unwrap();

        let report = Pipeline::new(&remote, dir.path())
            .with_retry_policy(quick_retry())
            .run(&plan, &mut ledger)
            .unwrap();

        assert_eq!(report.installed, ["Mist/Paks/good.pak"]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].reason.contains(&crc32_bytes(b"pak bytez")));
        assert_eq!(std::fs::read(dir.path().join("Mist/Paks/good.pak")).unwrap(), b"pak bytes");
        assert!(!dir.path().join("Mist/Paks/bad.pak").exists());
    }

    #[test]
    fn throttled_then_gives_up_after_one_retry() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new().serve("a.pak", Served::Status(503));
        let plan = plan_for(dir.path(), vec![entry("a.pak", b"a")]);
        let mut ledger = Ledger::load(&dir.path().join("ledger.json")).unwrap();
        let report = Pipeline::new(&remote, dir.path())
            .with_retry_policy(quick_retry())
            .run(&plan, &mut ledger)
            .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(remote.requests().len(), 2);
    }

    #[test]
    fn replaces_outdated_file_and_clears_stale_part() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pak"), b"old version").unwrap();
        std::fs::write(dir.path().join("a.pak.part"), b"crash leftovers").unwrap();
        let remote = FakeRemote::new().body("a.pak", b"new version!");
        let plan = plan_for(dir.path(), vec![entry("a.pak", b"new version!")]);
        let mut ledger = Ledger::load(&dir.path().join("ledger.json")).unwrap();

        let report = Pipeline::new(&remote, dir.path()).run(&plan, &mut ledger).unwrap();

        assert_eq!(report.installed, ["a.pak"]);
        assert_eq!(std::fs::read(dir.path().join("a.pak")).unwrap(), b"new version!");
        assert!(!dir.path().join("a.pak.part").exists());
    }

    #[test]
    fn cancel_mid_stream_stops_batch_and_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let abort = AbortToken::new();
        let remote = FakeRemote::new()
            .body("a.pak", b"first")
            .serve("b.pak", Served::CancelAfter(b"0123456789abcdef".to_vec(), 8, abort.clone()))
            .body("c.pak", b"third");
        let plan = plan_for(
            dir.path(),
            vec![entry("a.pak", b"first"), entry("b.pak", b"0123456789abcdef"), entry("c.pak", b"third")],
        );
        let mut ledger = Ledger::load(&dir.path().join("ledger.json")).unwrap();

        let report = Pipeline::new(&remote, dir.path())
            .with_abort(abort)
            .run(&plan, &mut ledger)
            .unwrap();

        assert!(report.cancelled);
        assert!(!report.is_complete());
        assert_eq!(report.installed, ["a.pak"]);
        assert!(report.failed.is_empty());
        assert!(!dir.path().join("b.pak").exists());
        assert!(!dir.path().join("b.pak.part").exists());
        assert!(!dir.path().join("c.pak").exists());
        assert_eq!(remote.requests(), ["a.pak", "b.pak"]);
        assert_eq!(ledger.entries(), ["a.pak"]);
    }

    #[test]
    fn ledger_write_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("game");
        let ledger_path = dir.path().join("state").join("ledger.json");
        let mut ledger = Ledger::load(&ledger_path).unwrap();
        std::fs::write(dir.path().join("state"), b"").unwrap();
        let remote = FakeRemote::new().body("a.pak", b"a").body("b.pak", b"b");
        let plan = plan_for(&root, vec![entry("a.pak", b"a"), entry("b.pak", b"b")]);

        let err = Pipeline::new(&remote, &root).run(&plan, &mut ledger).unwrap_err();

        assert!(matches!(err, PatchError::Ledger { .. }));
        // The file that triggered the write stays installed; the batch stops there.
        assert!(root.join("a.pak").exists());
        assert!(!root.join("b.pak").exists());
    }

    #[test]
    fn progress_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new().body("a.pak", b"aaaaaaaa").body("b.pak", b"bb");
        let plan = plan_for(dir.path(), vec![entry("a.pak", b"aaaaaaaa"), entry("b.pak", b"bb")]);
        let mut ledger = Ledger::load(&dir.path().join("ledger.json")).unwrap();
        let (tx, mut rx) = mpsc::channel(256);

        Pipeline::new(&remote, dir.path())
            .with_progress(tx)
            .run(&plan, &mut ledger)
            .unwrap();

        let mut installed = Vec::new();
        let mut last = None;
        while let Ok(e) = rx.try_recv() {
            if e.stage == Stage::Installed {
                installed.push(e.file.clone());
            }
            last = Some(e);
        }
        assert_eq!(installed, ["a.pak", "b.pak"]);
        let last = last.unwrap();
        assert_eq!(last.batch_bytes_total, 10);
        assert_eq!(last.batch_bytes_done, 10);
        assert_eq!(last.file_count, 2);
    }
}
