//! Engine-wide connection budget shared by every job's transfers.
//!
//! Each chunk job bounds its own parallelism; this pool bounds the sum across
//! all jobs so many concurrent chunked downloads cannot exceed
//! `connection_limit` open transfers.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::TransferError;

/// Shared connection budget. A permit is held for the duration of one HTTP
/// attempt and released before any backoff sleep.
#[derive(Debug, Clone)]
pub struct ConnectionBudget {
    max_total: usize,
    permits: Arc<Semaphore>,
}

impl ConnectionBudget {
    pub fn new(max_total: usize) -> Self {
        let max_total = max_total.max(1);
        Self {
            max_total,
            permits: Arc::new(Semaphore::new(max_total)),
        }
    }

    pub fn max_total(&self) -> usize {
        self.max_total
    }

    /// Connections currently held.
    pub fn in_use(&self) -> usize {
        self.max_total - self.permits.available_permits()
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a connection slot, or fail with `Cancelled` if `cancel` fires first.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<OwnedSemaphorePermit, TransferError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TransferError::Cancelled),
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|_| TransferError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn budget_acquire_and_release() {
        let budget = ConnectionBudget::new(2);
        let cancel = CancellationToken::new();
        assert_eq!(budget.available(), 2);
        let a = budget.acquire(&cancel).await.unwrap();
        let b = budget.acquire(&cancel).await.unwrap();
        assert_eq!(budget.in_use(), 2);
        assert_eq!(budget.available(), 0);
        drop(a);
        assert_eq!(budget.available(), 1);
        drop(b);
        assert_eq!(budget.in_use(), 0);
    }

    #[tokio::test]
    async fn waiting_for_a_slot_is_cancellable() {
        let budget = ConnectionBudget::new(1);
        let cancel = CancellationToken::new();
        let _held = budget.acquire(&cancel).await.unwrap();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let res = budget.acquire(&cancel).await;
        assert!(matches!(res, Err(TransferError::Cancelled)));
    }

    #[test]
    fn zero_limit_is_raised_to_one() {
        assert_eq!(ConnectionBudget::new(0).max_total(), 1);
    }
}
