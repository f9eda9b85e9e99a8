//! Retry logic for transient failures
//!
//! Failed attempts sleep a fixed backoff interval before the next attempt;
//! there is no exponential growth, matching the origin's tolerance for
//! immediate re-requests. Errors are classified through [`IsRetryable`] so
//! permanent failures (bad selection expressions, configuration problems)
//! surface immediately instead of burning the budget.

use crate::error::Error;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, connection resets, non-success HTTP
/// statuses) should return `true`. Permanent failures (invalid input,
/// configuration errors, corrupt data) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Non-success statuses from the origin are worth re-asking for
            Error::TransientFetch { .. } => true,
            // Network errors are retryable when they are timeouts or
            // connection-level failures
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            // I/O errors can be retryable in some cases
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Selection errors are caller input, never retried
            Error::Spec(_) => false,
            // Exhaustion is itself the end of a retry loop
            Error::AllMirrorsExhausted { .. } => false,
            // Key and decrypt failures have their own single-re-capture path
            Error::Key(_) | Error::Decrypt(_) => false,
            // Assembly, image and serialization failures are permanent
            Error::Assemble(_) | Error::Image(_) | Error::Serialization(_) => false,
            // Config errors are permanent
            Error::Config { .. } => false,
            Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with fixed-backoff retry
///
/// # Arguments
///
/// * `max_attempts` - Total attempts, including the first one
/// * `backoff` - Fixed sleep between attempts
/// * `operation` - Async closure returning `Result<T, E>` where `E: IsRetryable`
///
/// # Returns
///
/// The first successful result, or the last error once the budget is spent or
/// a non-retryable error occurs.
pub async fn retry_with_backoff<F, Fut, T, E>(
    max_attempts: u32,
    backoff: Duration,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                tracing::debug!(attempt, max_attempts, error = %e, "retrying after backoff");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
