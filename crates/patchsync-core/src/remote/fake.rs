//! In-memory remote for unit tests.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use super::Remote;
use crate::control::AbortToken;
use crate::retry::FetchError;

/// What the fake serves for one path.
#[derive(Clone)]
pub(crate) enum Served {
    Body(Vec<u8>),
    Status(u32),
    /// Sends the first bytes, then sets the abort token (simulates a user cancel mid-stream).
    CancelAfter(Vec<u8>, usize, AbortToken),
}

#[derive(Default)]
pub(crate) struct FakeRemote {
    pub(crate) manifest: Option<Vec<u8>>,
    files: HashMap<String, Served>,
    requests: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_manifest(mut self, body: &str) -> Self {
        self.manifest = Some(body.as_bytes().to_vec());
        self
    }

    pub(crate) fn serve(mut self, path: &str, served: Served) -> Self {
        self.files.insert(path.to_string(), served);
        self
    }

    pub(crate) fn body(self, path: &str, body: &[u8]) -> Self {
        self.serve(path, Served::Body(body.to_vec()))
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Remote for FakeRemote {
    fn fetch_manifest(&self) -> Result<Vec<u8>, FetchError> {
        self.manifest.clone().ok_or(FetchError::Http(404))
    }

    fn manifest_location(&self) -> String {
        "fake://manifest".to_string()
    }

    fn stream_file(
        &self,
        relative_path: &str,
        sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
        abort: &AbortToken,
    ) -> Result<u64, FetchError> {
        self.requests.lock().unwrap().push(relative_path.to_string());
        let (body, cancel_at) = match self.files.get(relative_path) {
            None => return Err(FetchError::Http(404)),
            Some(Served::Status(code)) => return Err(FetchError::Http(*code)),
            Some(Served::Body(b)) => (b.clone(), None),
            Some(Served::CancelAfter(b, n, token)) => (b.clone(), Some((*n, token.clone()))),
        };
        let mut sent = 0u64;
        for chunk in body.chunks(4) {
            if let Some((n, token)) = &cancel_at {
                if sent as usize >= *n {
                    token.abort();
                }
            }
            if abort.is_aborted() {
                return Err(FetchError::Aborted);
            }
            sink(chunk).map_err(FetchError::Storage)?;
            sent += chunk.len() as u64;
        }
        Ok(sent)
    }
}
