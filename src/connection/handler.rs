//! Connection Handler Module
//!
//! This module handles individual client connections to ringkv.
//! Each client gets its own handler task that runs in a loop,
//! reading request lines and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP or Unix socket)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │◄├── shutdown ends the loop here
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Split off a '\n' frame  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute command         │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Send response           │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / error / shutdown
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. A single read may
//! deliver half a line, or several lines at once. Complete lines are split
//! off the front of the buffer and executed in order.
//!
//! Protocol errors never end a connection: they are answered with an error
//! response and the loop carries on.

use crate::commands::CommandHandler;
use crate::protocol::FRAME_DELIMITER;
use crate::shutdown::Shutdown;
use bytes::BytesMut;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Maximum size of a single request line (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the stream so the same loop serves TCP and Unix sockets.
pub struct ConnectionHandler<S> {
    /// The client stream, buffered for writes
    stream: BufWriter<S>,

    /// Client's address (for logging)
    peer: String,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// How much of `buffer` is known to contain no delimiter
    scanned: usize,

    /// The command handler (shared store)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Server-wide shutdown token
    shutdown: Shutdown,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    pub fn new(
        stream: S,
        peer: impl fmt::Display,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        shutdown: Shutdown,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            peer: peer.to_string(),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            scanned: 0,
            command_handler,
            stats,
            shutdown,
        }
    }

    /// Runs the main connection loop.
    ///
    /// Returns `Ok(())` when the server shuts down, or the error that ended
    /// the connection (including a normal client disconnect).
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.peer, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(client = %self.peer, "Connection closed for shutdown"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    info!(client = %self.peer, "Client disconnected")
                }
                ConnectionError::UnexpectedEof => {
                    debug!(client = %self.peer, "Client disconnected mid-request")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.peer, "Connection reset by client")
                }
                _ => warn!(client = %self.peer, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Every line gets a reply, an empty one included (decode error)
            while let Some(frame) = self.next_frame() {
                let response = self.command_handler.execute(&frame);
                self.stats.command_processed();

                if !self.send_response(&response).await? {
                    return Ok(());
                }
            }

            if !self.read_more_data().await? {
                return Ok(());
            }
        }
    }

    /// Splits the next complete line off the buffer, without its delimiter.
    fn next_frame(&mut self) -> Option<BytesMut> {
        let offset = self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == FRAME_DELIMITER);

        match offset {
            Some(offset) => {
                let end = self.scanned + offset;
                let mut frame = self.buffer.split_to(end + 1);
                frame.truncate(end);
                self.scanned = 0;
                trace!(
                    client = %self.peer,
                    consumed = end + 1,
                    remaining = self.buffer.len(),
                    "Parsed frame"
                );
                Some(frame)
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    ///
    /// Returns `Ok(false)` if shutdown was signalled while waiting.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if self.buffer.len() >= MAX_FRAME_SIZE {
            return Err(ConnectionError::FrameTooLarge {
                size: self.buffer.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = tokio::select! {
            result = self.stream.get_mut().read_buf(&mut self.buffer) => result?,
            _ = self.shutdown.cancelled() => return Ok(false),
        };

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial line in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.peer, bytes = n, "Read data");

        Ok(true)
    }

    /// Sends a response to the client.
    ///
    /// Returns `Ok(false)` if shutdown was signalled before the write
    /// completed, so a client that stops reading cannot hold the server open.
    async fn send_response(&mut self, response: &[u8]) -> Result<bool, ConnectionError> {
        let stream = &mut self.stream;
        let write = async {
            stream.write_all(response).await?;
            stream.flush().await
        };

        tokio::select! {
            result = write => result?,
            _ = self.shutdown.cancelled() => {
                debug!(client = %self.peer, "Shutdown while writing response");
                return Ok(false);
            }
        }

        self.stats.bytes_written(response.len());
        trace!(
            client = %self.peer,
            bytes = response.len(),
            "Sent response"
        );
        Ok(true)
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial line)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// A single line exceeded the size limit
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion. Errors are logged by the handler itself.
pub async fn handle_connection<S>(
    stream: S,
    peer: impl fmt::Display,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: Shutdown,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, peer, command_handler, stats, shutdown);
    let _ = handler.run().await;
}
