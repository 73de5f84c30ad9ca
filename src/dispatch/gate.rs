//! Timed mutual exclusion for per-chain submissions.

use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;

use crate::error::{Result, SpigotError};

/// Mutual-exclusion gate serializing transfers from one signing account.
///
/// At most one task holds the gate at a time; an acquirer waits up to the
/// configured bound and then fails with `DispatcherBusy`. Waiters are not
/// served in FIFO order; starvation past the bound surfaces as busy. The
/// gate is process-local and carries no state across restarts.
pub struct DispatchGate {
    lock: Mutex<()>,
    wait: Duration,
    chain: String,
}

impl DispatchGate {
    /// Create a gate for one chain with the given acquisition bound.
    pub fn new(chain: &str, wait: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            wait,
            chain: chain.to_string(),
        }
    }

    /// Acquire the gate, waiting at most the configured bound.
    ///
    /// The returned guard releases the gate when dropped, so every exit
    /// path out of the critical section, including error propagation,
    /// releases it.
    pub async fn acquire(&self) -> Result<MutexGuard<'_, ()>> {
        match timeout(self.wait, self.lock.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => Err(SpigotError::DispatcherBusy(self.chain.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_acquire_when_free() {
        let gate = DispatchGate::new("testnet", Duration::from_millis(50));
        tokio_test::assert_ok!(gate.acquire().await);
    }

    #[tokio::test]
    async fn test_second_acquire_times_out() {
        let gate = DispatchGate::new("testnet", Duration::from_millis(20));

        let _held = gate.acquire().await.unwrap();
        let second = gate.acquire().await;

        assert!(matches!(second, Err(SpigotError::DispatcherBusy(ref c)) if c == "testnet"));
    }

    #[tokio::test]
    async fn test_released_on_drop() {
        let gate = DispatchGate::new("testnet", Duration::from_millis(20));

        {
            let _held = gate.acquire().await.unwrap();
        }

        tokio_test::assert_ok!(gate.acquire().await);
    }

    #[tokio::test]
    async fn test_released_when_holder_errors() {
        let gate = DispatchGate::new("testnet", Duration::from_millis(20));

        async fn failing_section(gate: &DispatchGate) -> Result<()> {
            let _held = gate.acquire().await?;
            Err(SpigotError::Submission("broadcast rejected".to_string()))
        }

        assert!(failing_section(&gate).await.is_err());

        // The guard dropped on the error path, so the gate is free again
        tokio_test::assert_ok!(gate.acquire().await);
    }
}
