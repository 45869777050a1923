//! Progress events for a patch batch (bytes done, rate, ETA).
//!
//! Consumers get a one-way stream of snapshots; rate and ETA are derived from
//! the batch counters and elapsed time.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

/// What the pipeline is doing with the current file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Downloading,
    Verifying,
    Installed,
    Failed,
}

/// Snapshot of batch progress, emitted while files transfer.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Relative path of the file being processed.
    pub file: String,
    /// 1-based position of `file` among the fetches in this batch.
    pub file_index: usize,
    pub file_count: usize,
    /// Bytes received for `file` in the current attempt.
    pub bytes_done: u64,
    /// Expected size of `file`.
    pub bytes_total: u64,
    /// Bytes across the batch: finished files plus the current attempt.
    pub batch_bytes_done: u64,
    pub batch_bytes_total: u64,
    /// Seconds since the batch started.
    pub elapsed_secs: f64,
    pub stage: Stage,
}

impl ProgressEvent {
    /// Batch download rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.batch_bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds until the batch finishes (None if rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.batch_bytes_total.saturating_sub(self.batch_bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Batch fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.batch_bytes_total == 0 {
            return 1.0;
        }
        (self.batch_bytes_done as f64 / self.batch_bytes_total as f64).min(1.0)
    }
}

const EMIT_INTERVAL: Duration = Duration::from_millis(100);

/// Builds events for one batch and pushes them with `try_send`.
pub(crate) struct ProgressTracker {
    tx: Option<mpsc::Sender<ProgressEvent>>,
    started: Instant,
    last_emit: Option<Instant>,
    file_count: usize,
    batch_total: u64,
    /// Bytes of files already finished (installed or given up on).
    batch_settled: u64,
    file: String,
    file_index: usize,
    file_total: u64,
    file_done: u64,
}

impl ProgressTracker {
    pub(crate) fn new(tx: Option<mpsc::Sender<ProgressEvent>>, file_count: usize, batch_total: u64) -> Self {
        Self {
            tx,
            started: Instant::now(),
            last_emit: None,
            file_count,
            batch_total,
            batch_settled: 0,
            file: String::new(),
            file_index: 0,
            file_total: 0,
            file_done: 0,
        }
    }

    pub(crate) fn begin_file(&mut self, file: &str, file_index: usize, bytes_total: u64) {
        self.file = file.to_string();
        self.file_index = file_index;
        self.file_total = bytes_total;
        self.file_done = 0;
        self.emit(Stage::Downloading, true);
    }

    /// A new attempt starts from zero bytes.
    pub(crate) fn restart_file(&mut self) {
        self.file_done = 0;
    }

    pub(crate) fn add_bytes(&mut self, n: u64) {
        self.file_done += n;
        self.emit(Stage::Downloading, false);
    }

    pub(crate) fn verifying(&mut self) {
        self.emit(Stage::Verifying, true);
    }

    /// Close out the current file; its full expected size counts as settled
    /// either way so the batch total stays reachable.
    pub(crate) fn finish_file(&mut self, stage: Stage) {
        if stage == Stage::Installed {
            self.file_done = self.file_total;
        }
        self.emit(stage, true);
        self.batch_settled += self.file_total;
        self.file_done = 0;
    }

    fn emit(&mut self, stage: Stage, force: bool) {
        let Some(tx) = &self.tx else { return };
        let now = Instant::now();
        if !force {
            if let Some(last) = self.last_emit {
                if now.duration_since(last) < EMIT_INTERVAL {
                    return;
                }
            }
        }
        self.last_emit = Some(now);
        let event = ProgressEvent {
            file: self.file.clone(),
            file_index: self.file_index,
            file_count: self.file_count,
            bytes_done: self.file_done,
            bytes_total: self.file_total,
            batch_bytes_done: self.batch_settled + self.file_done.min(self.file_total),
            batch_bytes_total: self.batch_total,
            elapsed_secs: now.duration_since(self.started).as_secs_f64(),
            stage,
        };
        // Lagging observer: drop the event rather than stall the transfer.
        let _ = tx.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(done: u64, total: u64, elapsed: f64) -> ProgressEvent {
        ProgressEvent {
            file: "a.pak".into(),
            file_index: 1,
            file_count: 1,
            bytes_done: done,
            bytes_total: total,
            batch_bytes_done: done,
            batch_bytes_total: total,
            elapsed_secs: elapsed,
            stage: Stage::Downloading,
        }
    }

    #[test]
    fn rate_eta_fraction() {
        let e = event(50, 200, 5.0);
        assert_eq!(e.bytes_per_sec(), 10.0);
        assert_eq!(e.eta_secs(), Some(15.0));
        assert_eq!(e.fraction(), 0.25);
        assert_eq!(event(0, 10, 0.0).eta_secs(), None);
        assert_eq!(event(0, 0, 0.0).fraction(), 1.0);
    }

    #[test]
    fn tracker_emits_forced_stages_and_settles_bytes() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut t = ProgressTracker::new(Some(tx), 2, 30);
        t.begin_file("a.pak", 1, 10);
        t.add_bytes(10);
        t.verifying();
        t.finish_file(Stage::Installed);
        t.begin_file("b.pak", 2, 20);
        t.finish_file(Stage::Failed);

        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        let installed = events.iter().find(|e| e.stage == Stage::Installed).unwrap();
        assert_eq!(installed.batch_bytes_done, 10);
        let last = events.last().unwrap();
        assert_eq!(last.stage, Stage::Failed);
        assert_eq!(last.file, "b.pak");
        assert_eq!(last.file_index, 2);
    }

    #[test]
    fn full_channel_does_not_block() {
        let (tx, _rx) = mpsc::channel(1);
        let mut t = ProgressTracker::new(Some(tx), 1, 4);
        t.begin_file("a.pak", 1, 4);
        t.verifying();
        t.finish_file(Stage::Installed);
    }
}
