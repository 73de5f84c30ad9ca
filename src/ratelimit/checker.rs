//! Frequency checker enforcing per-key grant limits over a sliding window.

use chrono::{Duration, Utc};
use tracing::{debug, trace};

use super::key::GrantKey;
use super::store::WindowStore;
use crate::error::Result;

/// Decides whether a new grant is allowed for a key and records grants.
///
/// The window is a fixed trailing period measured from each grant's own
/// timestamp: a grant stops counting exactly one window length after it was
/// made, not at any calendar boundary. Wall-clock rollback can briefly
/// under-restrict; that direction is tolerated.
pub struct FrequencyChecker {
    store: WindowStore,
    window: Duration,
}

impl FrequencyChecker {
    /// Create a checker with the standard 24-hour window.
    pub fn new(store: WindowStore) -> Self {
        Self::with_window(store, Duration::hours(24))
    }

    /// Create a checker with a custom window length.
    ///
    /// This is primarily useful for testing window expiry.
    pub fn with_window(store: WindowStore, window: Duration) -> Self {
        Self { store, window }
    }

    /// Decide whether a new grant for `key` is allowed under `limit`.
    ///
    /// Pure read; concurrent `record` calls for other keys do not interfere.
    /// A key with no prior record is allowed for any positive limit; a limit
    /// of 0 disables its class unconditionally. Store errors propagate so
    /// callers fail closed rather than treating an unreadable record as
    /// "allowed".
    pub fn check(&self, key: &GrantKey, limit: u64) -> Result<bool> {
        if limit == 0 {
            return Ok(false);
        }

        let cutoff = Utc::now() - self.window;
        let count = match self.store.load(key)? {
            Some(record) => record.count_since(cutoff) as u64,
            None => 0,
        };

        trace!(key = %key, count, limit, "Window occupancy checked");
        Ok(count < limit)
    }

    /// Consume one grant slot for `key` at the current instant.
    ///
    /// Not idempotent: callers invoke this exactly once per successful
    /// transfer per key. The write is flushed before this returns.
    pub async fn record(&self, key: &GrantKey) -> Result<()> {
        let now = Utc::now();
        let record = self.store.append(key, now, now - self.window).await?;
        debug!(key = %key, grants = record.granted_at.len(), "Grant recorded");
        Ok(())
    }

    /// Current in-window grant count for a key.
    pub fn count(&self, key: &GrantKey) -> Result<u64> {
        let cutoff = Utc::now() - self.window;
        Ok(self
            .store
            .load(key)?
            .map(|r| r.count_since(cutoff) as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_checker(dir: &TempDir) -> FrequencyChecker {
        FrequencyChecker::new(WindowStore::open(dir.path()).unwrap())
    }

    #[tokio::test]
    async fn test_unknown_key_is_allowed() {
        let dir = TempDir::new().unwrap();
        let checker = open_checker(&dir);
        let key = GrantKey::address("testnet", "test1qqqq");

        assert!(checker.check(&key, 1).unwrap());
        assert_eq!(checker.count(&key).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_limit_never_allows() {
        let dir = TempDir::new().unwrap();
        let checker = open_checker(&dir);
        let key = GrantKey::address("testnet", "test1qqqq");

        assert!(!checker.check(&key, 0).unwrap());
    }

    #[tokio::test]
    async fn test_limit_exhaustion() {
        let dir = TempDir::new().unwrap();
        let checker = open_checker(&dir);
        let key = GrantKey::ip("testnet", "203.0.113.7");
        let limit = 5;

        for _ in 0..limit {
            assert!(checker.check(&key, limit).unwrap());
            checker.record(&key).await.unwrap();
        }

        // The (L+1)-th check within the window is refused
        assert!(!checker.check(&key, limit).unwrap());
        assert_eq!(checker.count(&key).unwrap(), limit);
    }

    #[tokio::test]
    async fn test_grant_expires_after_window() {
        let dir = TempDir::new().unwrap();
        let store = WindowStore::open(dir.path()).unwrap();
        let checker = FrequencyChecker::with_window(store, Duration::milliseconds(50));
        let key = GrantKey::address("testnet", "test1qqqq");

        checker.record(&key).await.unwrap();
        assert!(!checker.check(&key, 1).unwrap());

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        // The grant fell out of the window, so the key is admissible again
        assert!(checker.check(&key, 1).unwrap());
        assert_eq!(checker.count(&key).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_keys_do_not_interfere() {
        let dir = TempDir::new().unwrap();
        let checker = open_checker(&dir);
        let exhausted = GrantKey::address("testnet", "test1aaaa");
        let fresh = GrantKey::address("testnet", "test1bbbb");
        let other_chain = GrantKey::address("devnet", "test1aaaa");

        checker.record(&exhausted).await.unwrap();

        assert!(!checker.check(&exhausted, 1).unwrap());
        assert!(checker.check(&fresh, 1).unwrap());
        assert!(checker.check(&other_chain, 1).unwrap());
    }
}
