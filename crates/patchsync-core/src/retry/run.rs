//! Retry loop: run a closure until success or policy says stop.

use std::time::{Duration, Instant};

use super::classify;
use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::AbortToken;

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Runs `f` until it succeeds or the retry policy says to stop. `f` receives the
/// 1-based attempt number. Backoff sleeps wake early when `abort` is set, in
/// which case `FetchError::Aborted` is returned.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, abort: &AbortToken, mut f: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Result<T, FetchError>,
{
    let mut attempt = 1u32;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        tracing::warn!(attempt, ?kind, delay_ms = d.as_millis() as u64, "transfer failed, retrying: {}", e);
                        sleep_unless_aborted(d, abort)?;
                        attempt += 1;
                    }
                }
            }
        }
    }
}

fn sleep_unless_aborted(d: Duration, abort: &AbortToken) -> Result<(), FetchError> {
    let deadline = Instant::now() + d;
    loop {
        if abort.is_aborted() {
            return Err(FetchError::Aborted);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
