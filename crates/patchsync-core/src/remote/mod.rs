//! Transport seam between the engine and the patch host.
//!
//! The engine only needs two things from the network: the manifest body and
//! a byte stream per relative path. `CurlRemote` provides both over libcurl;
//! TLS and proxy behaviour are whatever libcurl is configured with.

mod http;
#[cfg(test)]
pub(crate) mod fake;

use std::io;

use crate::control::AbortToken;
use crate::retry::FetchError;

pub use http::CurlRemote;

/// Source of the manifest and of file contents.
pub trait Remote: Send + Sync {
    /// Raw (already content-decoded) manifest body.
    fn fetch_manifest(&self) -> Result<Vec<u8>, FetchError>;

    /// Where the manifest comes from, for messages.
    fn manifest_location(&self) -> String;

    /// Stream the file at `relative_path` into `sink`, chunk by chunk.
    ///
    /// Returns the number of bytes handed to `sink`. A sink error aborts the
    /// transfer with `FetchError::Storage`; a set `abort` token aborts it with
    /// `FetchError::Aborted`.
    fn stream_file(
        &self,
        relative_path: &str,
        sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
        abort: &AbortToken,
    ) -> Result<u64, FetchError>;
}
