//! Storage Engine Module
//!
//! This module provides the in-memory store behind ringkv: a fixed ring of
//! independently locked buckets, the TTL-carrying envelope every value is
//! stored in, and the background sweeper that reclaims expired entries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       BucketRing                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │Bucket 0 │ │Bucket 1 │ │Bucket 2 │ │...N     │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ buckets │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!          ▲ crc32(key) mod N               ▲ one bucket per cycle
//!          │                                │
//!   CommandHandler               ┌──────────┴────────────┐
//!                                │     ExpirySweeper     │
//!                                │ (Background Tokio Task)│
//!                                └───────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: a fixed number of buckets, chosen at startup
//! - **RwLock per bucket**: concurrent readers, exclusive writers
//! - **TTL Support**: values carry an absolute expiry in Unix seconds
//! - **Lazy Expiry**: expired values read as absent
//! - **Active Expiry**: the sweeper removes expired and corrupt entries
//!
//! ## Example
//!
//! ```
//! use ringkv::storage::BucketRing;
//! use rmpv::Value;
//!
//! let ring = BucketRing::new(10).unwrap();
//!
//! ring.set("name", Value::from("ringkv"), 0).unwrap();
//! assert_eq!(ring.get("name").unwrap(), Value::from("ringkv"));
//!
//! // Expires one hour from now
//! ring.set("session", Value::from("token123"), 3600).unwrap();
//! ```

pub mod bucket;
pub mod convert;
pub mod envelope;
pub mod error;
pub mod expiry;
pub mod ring;

// Re-export commonly used types
pub use bucket::Bucket;
pub use envelope::Envelope;
pub use error::{StoreError, StoreResult};
pub use expiry::{ExpiryConfig, ExpirySweeper};
pub use ring::BucketRing;
