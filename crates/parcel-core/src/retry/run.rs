//! Retry loop: run an async operation until success or policy says stop.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use super::classify::classify;
use super::policy::{RetryDecision, RetryPolicy};
use crate::error::TransferError;

/// Runs `op` until it succeeds, the policy gives up, or `cancel` fires.
/// `op` receives the 0-based attempt number. Backoff sleeps are cancellable;
/// the last error is returned when retries are exhausted.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T, TransferError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransferError>>,
{
    let mut retries = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let err = match op(retries).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        match policy.decide(retries, classify(&err)) {
            RetryDecision::NoRetry => return Err(err),
            RetryDecision::RetryAfter(d) => {
                tracing::warn!(
                    "{label}: attempt {} failed ({err}); retrying in {:?}",
                    retries + 1,
                    d
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                    _ = tokio::time::sleep(d) => {}
                }
                retries += 1;
            }
        }
    }
}
