//! Bucket Ring
//!
//! The ring is the whole store: a fixed sequence of [`Bucket`]s plus the
//! routing function that assigns every key to exactly one of them.
//!
//! ## Routing
//!
//! ```text
//! bucket_index(key) = crc32_ieee(key bytes) mod shard_count
//! ```
//!
//! The shard count is fixed when the ring is built, so a key lands on the
//! same bucket for the lifetime of the process. There is no resharding.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       BucketRing                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │Bucket 0 │ │Bucket 1 │ │Bucket 2 │ │Bucket N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ring is shared behind an `Arc` by every connection task and by the
//! sweeper. Operations on different buckets never contend.

use crate::storage::bucket::Bucket;
use crate::storage::error::{StoreError, StoreResult};
use rmpv::Value;

/// A fixed-size, CRC-32 routed collection of buckets.
///
/// # Example
///
/// ```
/// use ringkv::storage::BucketRing;
/// use rmpv::Value;
///
/// let ring = BucketRing::new(10).unwrap();
///
/// ring.set("name", Value::from("ringkv"), 0).unwrap();
/// assert_eq!(ring.get("name").unwrap(), Value::from("ringkv"));
///
/// ring.del("name").unwrap();
/// assert!(ring.get("name").is_err());
/// ```
#[derive(Debug)]
pub struct BucketRing {
    buckets: Vec<Bucket>,
}

impl BucketRing {
    /// Creates a ring of `shards` empty buckets.
    ///
    /// Fails with [`StoreError::InvalidShardCount`] if `shards <= 0`.
    pub fn new(shards: i64) -> StoreResult<Self> {
        let count = usize::try_from(shards)
            .ok()
            .filter(|&n| n > 0)
            .ok_or(StoreError::InvalidShardCount(shards))?;

        let buckets = (0..count).map(|_| Bucket::new()).collect();
        Ok(Self { buckets })
    }

    /// Number of buckets in the ring.
    pub fn shard_count(&self) -> usize {
        self.buckets.len()
    }

    /// Index of the bucket responsible for `key`, or `None` for an empty ring.
    #[inline]
    pub fn bucket_index(&self, key: &str) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        Some(crc32fast::hash(key.as_bytes()) as usize % self.buckets.len())
    }

    /// The bucket responsible for `key`.
    #[inline]
    pub fn route(&self, key: &str) -> Option<&Bucket> {
        self.bucket_index(key).map(|index| &self.buckets[index])
    }

    /// The bucket at `index`, used by the sweeper to walk the ring.
    pub fn bucket(&self, index: usize) -> Option<&Bucket> {
        self.buckets.get(index)
    }

    /// Looks up a live value.
    pub fn get(&self, key: &str) -> StoreResult<Value> {
        self.routed(key)?.get(key)
    }

    /// Stores a value, expiring after `ttl_seconds` if positive.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl_seconds: i64) -> StoreResult<()> {
        let key = key.into();
        self.routed(&key)?.set(key, value, ttl_seconds)
    }

    /// Removes a key. Deleting an absent key is not an error.
    pub fn del(&self, key: &str) -> StoreResult<()> {
        self.routed(key)?.del(key);
        Ok(())
    }

    /// Total number of stored entries across all buckets.
    ///
    /// Buckets are counted one at a time, so under concurrent writes this
    /// is approximate. Expired entries that have not been swept are included.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Bucket::is_empty)
    }

    fn routed(&self, key: &str) -> StoreResult<&Bucket> {
        self.route(key).ok_or(StoreError::BucketNotFound)
    }

    /// A ring with no buckets, which can route nothing.
    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self {
            buckets: Vec::new(),
        }
    }
}
