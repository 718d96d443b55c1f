//! A single shard of the key space.
//!
//! A bucket maps keys to the *encoded* bytes of an [`Envelope`]. Values are
//! decoded on every read, so the map itself never needs to know about
//! payload types or expiry.
//!
//! Each bucket is guarded by its own reader/writer lock: `get` takes the read
//! side and may overlap with other readers, `set` and `del` take the write
//! side. Nothing ever holds two bucket locks at once.

use crate::storage::envelope::Envelope;
use crate::storage::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use rmpv::Value;
use std::collections::HashMap;
use tracing::trace;

/// One independently locked partition of the store.
#[derive(Debug, Default)]
pub struct Bucket {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a live value.
    ///
    /// Expired entries are reported as [`StoreError::ValueNotFound`] but are
    /// left in place: removal is the job of `del` or the sweeper, so a read
    /// never needs the write lock.
    pub fn get(&self, key: &str) -> StoreResult<Value> {
        let entries = self.entries.read();
        let bytes = entries.get(key).ok_or(StoreError::ValueNotFound)?;
        let envelope = Envelope::decode(bytes)?;
        if envelope.is_expired() {
            return Err(StoreError::ValueNotFound);
        }
        envelope.unwrap_value().ok_or(StoreError::ValueNotFound)
    }

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// A `ttl_seconds` of zero or less stores the value without expiry.
    pub fn set(&self, key: String, value: Value, ttl_seconds: i64) -> StoreResult<()> {
        let bytes = Envelope::new(value, ttl_seconds).encode()?;
        self.entries.write().insert(key, bytes);
        Ok(())
    }

    /// Removes `key`. Returns `true` if an entry was present.
    pub fn del(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry that is expired or cannot be decoded.
    ///
    /// Candidates are collected under the read lock; each is then removed
    /// through the regular write-locked delete path, re-checked first so a
    /// value written in between is not lost.
    ///
    /// Returns the number of entries removed.
    pub fn purge_stale(&self) -> usize {
        let candidates: Vec<String> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|(_, bytes)| is_stale(bytes))
                .map(|(key, _)| key.clone())
                .collect()
        };

        let mut removed = 0;
        for key in candidates {
            if self.del_if_stale(&key) {
                removed += 1;
            }
        }
        removed
    }

    fn del_if_stale(&self, key: &str) -> bool {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(bytes) if is_stale(bytes) => {
                entries.remove(key);
                trace!(key = key, "Removed stale entry");
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
        self.entries.write().insert(key.to_string(), bytes);
    }
}

/// An entry is stale if it has expired or is not a valid envelope.
fn is_stale(bytes: &[u8]) -> bool {
    Envelope::decode(bytes)
        .map(|envelope| envelope.is_expired())
        .unwrap_or(true)
}
