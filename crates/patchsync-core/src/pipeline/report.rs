//! Batch outcomes returned by the pipeline.

/// A file the batch gave up on, with the last error as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: String,
    pub reason: String,
}

/// Result of one patch batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Paths installed and recorded in the ledger, in install order.
    pub installed: Vec<String>,
    pub failed: Vec<FailedFile>,
    /// True if the batch stopped early on user request.
    pub cancelled: bool,
    /// Bytes of installed files.
    pub bytes_installed: u64,
}

impl BatchReport {
    /// Every planned file installed and nothing was cancelled.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    pub(crate) fn fail(&mut self, path: &str, reason: impl ToString) {
        self.failed.push(FailedFile {
            path: path.to_string(),
            reason: reason.to_string(),
        });
    }
}
