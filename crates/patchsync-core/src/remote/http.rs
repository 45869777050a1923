//! libcurl-backed remote: one easy handle per request, blocking.

use std::io;
use std::time::Duration;

use url::Url;

use super::Remote;
use crate::config::{NetworkConfig, PatcherConfig};
use crate::control::AbortToken;
use crate::error::{PatchError, PatchResult};
use crate::retry::FetchError;

/// HTTP(S) remote addressed by a manifest URL and a base URL for files.
#[derive(Debug, Clone)]
pub struct CurlRemote {
    manifest_url: Url,
    file_base: Url,
    network: NetworkConfig,
}

impl CurlRemote {
    pub fn new(manifest_url: &str, file_base_url: &str, network: NetworkConfig) -> PatchResult<Self> {
        let manifest_url = Url::parse(manifest_url)
            .map_err(|e| PatchError::Config(format!("manifest_url {:?}: {}", manifest_url, e)))?;
        let file_base = Url::parse(file_base_url)
            .map_err(|e| PatchError::Config(format!("file_base_url {:?}: {}", file_base_url, e)))?;
        if file_base.cannot_be_a_base() {
            return Err(PatchError::Config(format!(
                "file_base_url {:?} cannot be used as a base",
                file_base_url
            )));
        }
        Ok(Self {
            manifest_url,
            file_base,
            network,
        })
    }

    pub fn from_config(cfg: &PatcherConfig) -> PatchResult<Self> {
        Self::new(&cfg.manifest_url, &cfg.file_base_url, cfg.network.clone())
    }

    /// URL of a manifest path: each segment appended to the base path and
    /// percent-encoded, so spaces, `#` and `?` in file names stay literal.
    pub fn file_url(&self, relative_path: &str) -> Url {
        let mut url = self.file_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for segment in relative_path.split('/') {
                segments.push(segment);
            }
        }
        url
    }

    fn easy(&self, url: &Url) -> Result<curl::easy::Easy, curl::Error> {
        let net = &self.network;
        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.useragent(&net.user_agent)?;
        // Non-2xx responses fail the transfer before any body reaches the sink.
        easy.fail_on_error(true)?;
        easy.connect_timeout(Duration::from_secs(net.connect_timeout_secs))?;
        // Low-speed abort doubles as the read timeout for stalled streams.
        easy.low_speed_limit(net.low_speed_limit_bytes)?;
        easy.low_speed_time(Duration::from_secs(net.low_speed_time_secs))?;
        easy.timeout(Duration::from_secs(net.total_timeout_secs))?;
        Ok(easy)
    }
}

/// Turn a failed perform into a FetchError, preferring the abort flag and the
/// sink's own IO error over curl's generic write error.
fn perform_error(
    e: curl::Error,
    easy: &mut curl::easy::Easy,
    sink_error: Option<io::Error>,
    abort: &AbortToken,
) -> FetchError {
    if abort.is_aborted() {
        return FetchError::Aborted;
    }
    if e.is_write_error() {
        if let Some(io_err) = sink_error {
            return FetchError::Storage(io_err);
        }
    }
    if e.is_http_returned_error() {
        if let Ok(code) = easy.response_code() {
            return FetchError::Http(code);
        }
    }
    FetchError::Curl(e)
}

fn ensure_2xx(easy: &mut curl::easy::Easy) -> Result<(), FetchError> {
    let code = easy.response_code().map_err(FetchError::Curl)?;
    // file:// URLs report 0.
    if code != 0 && !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }
    Ok(())
}

impl Remote for CurlRemote {
    fn fetch_manifest(&self) -> Result<Vec<u8>, FetchError> {
        let mut easy = self.easy(&self.manifest_url).map_err(FetchError::Curl)?;
        // Empty string enables every encoding libcurl supports (gzip, deflate).
        easy.accept_encoding("").map_err(FetchError::Curl)?;
        let mut body = Vec::new();
        let result = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(FetchError::Curl)?;
            transfer.perform()
        };
        if let Err(e) = result {
            return Err(perform_error(e, &mut easy, None, &AbortToken::new()));
        }
        ensure_2xx(&mut easy)?;
        Ok(body)
    }

    fn manifest_location(&self) -> String {
        self.manifest_url.to_string()
    }

    fn stream_file(
        &self,
        relative_path: &str,
        sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
        abort: &AbortToken,
    ) -> Result<u64, FetchError> {
        let url = self.file_url(relative_path);
        tracing::debug!(url = %url, "GET");
        let mut easy = self.easy(&url).map_err(FetchError::Curl)?;
        easy.progress(true).map_err(FetchError::Curl)?;

        let mut received = 0u64;
        let mut sink_error: Option<io::Error> = None;
        let result = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    if abort.is_aborted() {
                        return Ok(0);
                    }
                    match sink(data) {
                        Ok(()) => {
                            received += data.len() as u64;
                            Ok(data.len())
                        }
                        Err(e) => {
                            sink_error = Some(e);
                            Ok(0)
                        }
                    }
                })
                .map_err(FetchError::Curl)?;
            // Lets a cancel land while the stream is stalled between writes.
            transfer
                .progress_function(|_, _, _, _| !abort.is_aborted())
                .map_err(FetchError::Curl)?;
            transfer.perform()
        };
        if let Err(e) = result {
            return Err(perform_error(e, &mut easy, sink_error, abort));
        }
        ensure_2xx(&mut easy)?;
        Ok(received)
    }
}
