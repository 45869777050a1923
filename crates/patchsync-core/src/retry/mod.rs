//! Retry and backoff for per-file transfers.
//!
//! Errors are classified (timeout, throttling, connection, corrupt body) and
//! the policy turns the kind and attempt number into a backoff delay.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
