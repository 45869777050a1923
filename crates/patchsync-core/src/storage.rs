//! Temp-file lifecycle for one transfer.
//!
//! Bytes land in `<destination>.part` next to the destination so the final
//! rename never crosses a filesystem. A `PartFile` that is dropped without
//! `finalize` deletes its temp file, so every exit path (verification
//! failure, transfer error, cancel, panic) leaves no partial file behind.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

const WRITE_BUF: usize = 128 * 1024;

/// Path for the temp file: appends `.part` to the final path (e.g. `a.pak` → `a.pak.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Remove a `.part` left behind by an interrupted run. Returns true if one existed.
pub fn remove_stale(final_path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(temp_path(final_path)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Sequential writer for one download's temp file.
pub struct PartFile {
    writer: Option<BufWriter<File>>,
    temp_path: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create (or truncate) the temp file for `final_path`.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        let temp_path = temp_path(final_path);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        Ok(PartFile {
            writer: Some(BufWriter::with_capacity(WRITE_BUF, file)),
            temp_path,
            written: 0,
        })
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "temp file already closed"))?;
        writer.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush buffered bytes and sync file data to disk. Call before fingerprinting.
    pub fn sync(&mut self) -> io::Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Path to the current temp file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Flush, close, and atomically rename the temp file over `final_path`.
    pub fn finalize(mut self, final_path: &Path) -> io::Result<()> {
        self.sync()?;
        self.writer.take();
        std::fs::rename(&self.temp_path, final_path)?;
        // Renamed away; nothing left for Drop to clean up.
        self.temp_path = PathBuf::new();
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        self.writer.take();
        if self.temp_path.as_os_str().is_empty() {
            return;
        }
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => tracing::debug!(path = %self.temp_path.display(), "removed temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.temp_path.display(), "could not remove temp file: {}", e),
        }
    }
}
