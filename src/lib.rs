//! # ringkv - A Sharded In-Memory Key-Value Server
//!
//! ringkv stores MessagePack values under string keys, partitions them over a
//! fixed ring of buckets, and serves `get`, `set` and `del` to clients over a
//! newline-framed MessagePack protocol on TCP or a Unix socket.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               ringkv                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Server    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (TCP/Unix)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │  MessagePack│    │                BucketRing                    │   │
//! │  │  Frames     │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │             │    │  │Bucket 0│ │Bucket 1│ │Bucket 2│ │...N-1  │ │   │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │        │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │    ExpirySweeper (one bucket per cycle)         │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use ringkv::config::{ListenAddr, ServerConfig};
//! use ringkv::server::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig {
//!         listen: ListenAddr::Tcp("127.0.0.1:6700".parse()?),
//!         shard_count: 10,
//!         sweep_cycle: Duration::from_secs(10),
//!     })
//!     .await?;
//!
//!     let shutdown = server.shutdown_handle();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.trigger();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: bucket ring, value envelopes and the expiry sweeper
//! - [`protocol`]: request/response types and the wire codec
//! - [`commands`]: executes requests against the ring
//! - [`connection`]: per-client framing loop
//! - [`server`]: listener, task tracking and shutdown
//! - [`config`]: TOML file settings
//!
//! ## Expiry
//!
//! Entries with a TTL expire two ways:
//! 1. **Lazy**: `get` treats an expired entry as absent
//! 2. **Active**: a background task purges one bucket per cycle

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod storage;

pub use commands::CommandHandler;
pub use config::{Config, ConfigError, ListenAddr, ServerConfig};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{parse_request, parse_response, ErrorCode, Request, Response};
pub use server::{Server, ServerError};
pub use shutdown::Shutdown;
pub use storage::{BucketRing, Envelope, ExpiryConfig, ExpirySweeper, StoreError};

/// Version of ringkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
