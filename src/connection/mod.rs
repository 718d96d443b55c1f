//! Client Connections
//!
//! One task per accepted stream, TCP or Unix alike. The handler is generic
//! over any `AsyncRead + AsyncWrite` stream, so tests drive it with in-memory
//! duplex pipes and scripted mocks as well as real sockets.
//!
//! ```text
//!   listener.accept()
//!         │ spawn
//!         ▼
//!   ConnectionHandler ── bytes ──► BytesMut ── '\n' ──► CommandHandler
//!         ▲                                                  │
//!         └──────────────── encoded response ◄───────────────┘
//! ```
//!
//! - Several requests arriving in one read are answered in order
//! - A request split across reads waits for its delimiter
//! - A bad request gets an error response; the connection stays open
//! - Idle connections close once the shared [`Shutdown`](crate::Shutdown) fires
//!
//! ## Example
//!
//! ```no_run
//! use ringkv::commands::CommandHandler;
//! use ringkv::connection::{handle_connection, ConnectionStats};
//! use ringkv::storage::BucketRing;
//! use ringkv::Shutdown;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! # async fn serve() -> Result<(), Box<dyn std::error::Error>> {
//! let ring = Arc::new(BucketRing::new(10)?);
//! let stats = Arc::new(ConnectionStats::new());
//! let shutdown = Shutdown::new();
//! let listener = TcpListener::bind("127.0.0.1:6700").await?;
//!
//! let (stream, addr) = listener.accept().await?;
//! let handler = CommandHandler::new(Arc::clone(&ring));
//! tokio::spawn(handle_connection(stream, addr, handler, stats, shutdown));
//! # Ok(())
//! # }
//! ```

pub mod handler;

pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, MAX_FRAME_SIZE,
};
