//! Value Envelope
//!
//! Every stored value is wrapped in an envelope that records when it expires.
//! The envelope is what actually lives in a bucket: it is serialized to a
//! MessagePack map on `set` and decoded again on every read.
//!
//! ## Wire Layout
//!
//! ```text
//! { "value": <any msgpack value>, "expire": <unix seconds, 0 = never> }
//! ```
//!
//! An envelope is never mutated in place. A second `set` on the same key
//! builds a brand new envelope and replaces the stored bytes wholesale.

use crate::storage::convert;
use crate::storage::error::{StoreError, StoreResult};
use rmpv::Value;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole Unix seconds (UTC).
pub fn now_unix() -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    i64::try_from(now.as_secs()).unwrap_or(i64::MAX)
}

/// A stored value together with its absolute expiration instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The payload. `None` only for malformed or nil payloads.
    #[serde(default)]
    value: Option<Value>,

    /// Absolute expiry in Unix seconds, `0` meaning "never expires".
    #[serde(default)]
    expire: i64,
}

impl Envelope {
    /// Wraps `value`, expiring `ttl_seconds` from now.
    ///
    /// A TTL of zero or less means the value never expires.
    pub fn new(value: Value, ttl_seconds: i64) -> Self {
        let expire = if ttl_seconds > 0 {
            now_unix().saturating_add(ttl_seconds)
        } else {
            0
        };
        Self::expiring_at(value, expire)
    }

    /// Wraps `value` with an explicit absolute expiry (`0` = never).
    pub fn expiring_at(value: Value, expire: i64) -> Self {
        Self {
            value: Some(value),
            expire,
        }
    }

    /// Serializes the envelope into the bytes stored in a bucket.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| StoreError::Encode(e.to_string()))
    }

    /// Decodes stored bytes back into an envelope.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Returns true if the envelope carries a TTL that has already elapsed.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expire != 0 && self.expire <= now_unix()
    }

    /// The absolute expiry in Unix seconds, or `None` if it never expires.
    pub fn expire_at(&self) -> Option<i64> {
        (self.expire != 0).then_some(self.expire)
    }

    /// Borrows the payload.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Consumes the envelope and returns the payload.
    pub fn unwrap_value(self) -> Option<Value> {
        self.value
    }

    /// The payload as text, if it has a textual form.
    pub fn text(&self) -> Option<String> {
        self.value.as_ref().and_then(convert::to_text)
    }

    /// The payload as an integer.
    pub fn int(&self) -> Option<i64> {
        self.value.as_ref().and_then(convert::to_int)
    }

    /// The payload as a float.
    pub fn float(&self) -> Option<f64> {
        self.value.as_ref().and_then(convert::to_float)
    }

    /// The payload as a boolean.
    pub fn bool(&self) -> Option<bool> {
        self.value.as_ref().and_then(convert::to_bool)
    }
}
