//! Background Expiry Sweeper
//!
//! Reads already hide expired entries ("lazy expiry"), but never remove them.
//! A key that expires and is never touched again would stay in memory
//! forever. The sweeper reclaims it ("active expiry").
//!
//! ## Design
//!
//! The sweeper runs as a single Tokio task and, once per cycle:
//! 1. Sleeps for the configured cycle (or returns on shutdown)
//! 2. Wakes up and scans exactly one bucket, round-robin from bucket 0
//! 3. Removes every entry that is expired or cannot be decoded
//!
//! Scanning one bucket per tick bounds how long a sweep holds any lock. A
//! full pass over the store takes `shard_count` cycles, so an expired entry
//! is physically gone at most `shard_count × cycle` after it expires.

use crate::shutdown::Shutdown;
use crate::storage::BucketRing;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Time between two bucket scans (default: 10s)
    pub cycle: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            cycle: Duration::from_secs(10),
        }
    }
}

/// Walks the ring one bucket per cycle, purging stale entries.
#[derive(Debug)]
pub struct ExpirySweeper {
    ring: Arc<BucketRing>,
    config: ExpiryConfig,
    /// Index of the next bucket to scan
    cursor: usize,
}

impl ExpirySweeper {
    pub fn new(ring: Arc<BucketRing>, config: ExpiryConfig) -> Self {
        Self {
            ring,
            config,
            cursor: 0,
        }
    }

    /// Index of the bucket the next sweep will scan.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Scans the next bucket and advances the cursor.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_once(&mut self) -> usize {
        let shards = self.ring.shard_count();
        if shards == 0 {
            return 0;
        }

        let index = self.cursor;
        self.cursor = (self.cursor + 1) % shards;

        let removed = self
            .ring
            .bucket(index)
            .map(|bucket| bucket.purge_stale())
            .unwrap_or(0);

        if removed > 0 {
            debug!(bucket = index, removed = removed, "Expired keys cleaned up");
        } else {
            trace!(bucket = index, "Sweep found nothing to clean");
        }
        removed
    }

    /// Runs the sweep loop until `shutdown` fires.
    pub async fn run(mut self, shutdown: Shutdown) {
        info!(
            cycle_ms = self.config.cycle.as_millis() as u64,
            shards = self.ring.shard_count(),
            "Background expiry sweeper started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.cycle) => {}
                _ = shutdown.cancelled() => {
                    debug!("Expiry sweeper received shutdown signal");
                    break;
                }
            }

            self.sweep_once();
        }

        info!("Background expiry sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::envelope::{now_unix, Envelope};
    use rmpv::Value;

    fn expired_bytes() -> Vec<u8> {
        Envelope::expiring_at(Value::from("value"), now_unix() - 1)
            .encode()
            .unwrap()
    }

    /// Finds a key that routes to `index`.
    fn key_for(ring: &BucketRing, index: usize, tag: &str) -> String {
        (0..)
            .map(|i| format!("{}-{}", tag, i))
            .find(|key| ring.bucket_index(key) == Some(index))
            .unwrap()
    }

    #[test]
    fn test_sweep_visits_one_bucket_round_robin() {
        let ring = Arc::new(BucketRing::new(3).unwrap());
        for index in 0..3 {
            let key = key_for(&ring, index, "stale");
            ring.bucket(index).unwrap().insert_raw(&key, expired_bytes());
        }

        let mut sweeper = ExpirySweeper::new(Arc::clone(&ring), ExpiryConfig::default());

        assert_eq!(sweeper.cursor(), 0);
        assert_eq!(sweeper.sweep_once(), 1);
        assert!(ring.bucket(0).unwrap().is_empty());
        assert_eq!(ring.len(), 2);

        assert_eq!(sweeper.sweep_once(), 1);
        assert_eq!(sweeper.sweep_once(), 1);
        assert!(ring.is_empty());

        // Wrapped back to the first bucket
        assert_eq!(sweeper.cursor(), 0);
        assert_eq!(sweeper.sweep_once(), 0);
    }

    #[test]
    fn test_sweep_keeps_live_entries() {
        let ring = Arc::new(BucketRing::new(1).unwrap());
        ring.set("persistent", Value::from("value"), 0).unwrap();
        ring.set("later", Value::from("value"), 3600).unwrap();
        ring.bucket(0).unwrap().insert_raw("corrupt", b"value".to_vec());

        let mut sweeper = ExpirySweeper::new(Arc::clone(&ring), ExpiryConfig::default());

        assert_eq!(sweeper.sweep_once(), 1);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.get("persistent"), Ok(Value::from("value")));
    }

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let ring = Arc::new(BucketRing::new(2).unwrap());
        for i in 0..10 {
            let key = format!("key{}", i);
            let bucket = ring.route(&key).unwrap();
            bucket.insert_raw(&key, expired_bytes());
        }
        ring.set("persistent", Value::from("value"), 0).unwrap();
        assert_eq!(ring.len(), 11);

        let shutdown = Shutdown::new();
        let config = ExpiryConfig {
            cycle: Duration::from_millis(10),
        };
        let task = tokio::spawn(
            ExpirySweeper::new(Arc::clone(&ring), config).run(shutdown.clone()),
        );

        // Two buckets need at least two cycles
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(ring.len(), 1);
        assert_eq!(ring.get("persistent"), Ok(Value::from("value")));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let ring = Arc::new(BucketRing::new(1).unwrap());
        let shutdown = Shutdown::new();
        let config = ExpiryConfig {
            cycle: Duration::from_secs(3600),
        };

        let task = tokio::spawn(ExpirySweeper::new(Arc::clone(&ring), config).run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;

        shutdown.trigger();

        // Returns without waiting out the cycle
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        // Nothing reclaims entries once stopped
        ring.bucket(0).unwrap().insert_raw("key", expired_bytes());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ring.len(), 1);
    }
}
