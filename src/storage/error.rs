//! Errors raised by the storage layer.

use thiserror::Error;

/// Errors that can occur while building or operating on the bucket ring.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The ring was configured with zero or a negative number of buckets.
    #[error("bucket num can't be less than or equal to 0 (got {0})")]
    InvalidShardCount(i64),

    /// The ring has no bucket to route a key to.
    #[error("bucket not found")]
    BucketNotFound,

    /// The key is absent, or its entry has expired.
    #[error("value not found")]
    ValueNotFound,

    /// A stored envelope could not be decoded.
    #[error("envelope decode error: {0}")]
    Decode(String),

    /// A value could not be encoded into an envelope.
    #[error("envelope encode error: {0}")]
    Encode(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
