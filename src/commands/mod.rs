//! Command Handler Module
//!
//! This module implements the command processing layer for ringkv.
//! It receives raw request frames, executes them against the bucket ring,
//! and returns encoded responses.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Frame Parser   │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Validate     │
//! │  - Dispatch     │
//! │  - Respond      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   BucketRing    │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `get key` - Read a live value
//! - `set key value [expire]` - Store a value, optionally with a TTL in seconds
//! - `del key` - Remove a key (idempotent)

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
