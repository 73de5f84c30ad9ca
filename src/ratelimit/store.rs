//! Durable grant-window store backed by sled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::trace;

use super::key::GrantKey;
use crate::error::Result;

/// Grant history for one key, bounded by the trailing window.
///
/// Timestamps older than the window are pruned opportunistically on write;
/// readers filter by cutoff, so stale entries never inflate a count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantRecord {
    /// Timestamps of prior grants, oldest first
    pub granted_at: Vec<DateTime<Utc>>,
}

impl GrantRecord {
    /// Number of grants at or after `cutoff`.
    pub fn count_since(&self, cutoff: DateTime<Utc>) -> usize {
        self.granted_at.iter().filter(|t| **t >= cutoff).count()
    }

    /// Drop grants that fell out of the window.
    pub fn prune(&mut self, cutoff: DateTime<Utc>) {
        self.granted_at.retain(|t| *t >= cutoff);
    }
}

/// Durable key/value store mapping grant keys to their grant history.
///
/// Writes to the same key are linearizable: `append` runs a compare-and-swap
/// loop against the current value, so concurrent writers for one key settle
/// into a total order while writers for different keys never interfere.
/// Every write is flushed before `append` returns, so a process restart
/// never loses granted counts.
pub struct WindowStore {
    tree: sled::Tree,
}

impl WindowStore {
    /// Open (or create) the store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree("grants")?;
        Ok(Self { tree })
    }

    /// Load the record for a key. `None` means the key has never been granted.
    pub fn load(&self, key: &GrantKey) -> Result<Option<GrantRecord>> {
        match self.tree.get(key.to_storage_key().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Append a grant at `at`, pruning entries older than `cutoff`.
    ///
    /// Returns the record as written. Not idempotent: every call consumes
    /// one grant slot.
    pub async fn append(
        &self,
        key: &GrantKey,
        at: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<GrantRecord> {
        let storage_key = key.to_storage_key().into_bytes();

        loop {
            let current = self.tree.get(&storage_key)?;
            let mut record = match &current {
                Some(bytes) => serde_json::from_slice::<GrantRecord>(bytes)?,
                None => GrantRecord::default(),
            };

            record.prune(cutoff);
            record.granted_at.push(at);
            let encoded = serde_json::to_vec(&record)?;

            match self
                .tree
                .compare_and_swap(&storage_key, current, Some(encoded))?
            {
                Ok(()) => {
                    self.tree.flush_async().await?;
                    return Ok(record);
                }
                Err(_) => {
                    // Lost the race against another writer for this key;
                    // retry against the fresh value.
                    trace!(key = %key, "Concurrent append, retrying");
                    continue;
                }
            }
        }
    }

    /// Number of keys with a stored record.
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }
}
