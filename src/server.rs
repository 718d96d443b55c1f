//! Server Lifecycle
//!
//! Ties the store, the sweeper and the connection handlers together.
//!
//! ```text
//!  Initializing ──► Listening ──► ShuttingDown ──► Stopped
//!   bind()           run()         token fired      run() returns
//! ```
//!
//! - **Initializing**: build the bucket ring (an invalid shard count aborts
//!   startup) and bind the TCP or Unix listener.
//! - **Listening**: start the expiry sweeper, then accept connections and
//!   spawn one task per client.
//! - **ShuttingDown**: the shared [`Shutdown`] token fires. The accept loop
//!   stops and drops the listener, the sweeper leaves its wait, and every
//!   connection closes, whether it is waiting to read or to write.
//! - **Stopped**: `run` returns only after every spawned task has exited.

use crate::commands::CommandHandler;
use crate::config::{ListenAddr, ServerConfig};
use crate::connection::{handle_connection, ConnectionStats};
use crate::shutdown::Shutdown;
use crate::storage::{BucketRing, ExpiryConfig, ExpirySweeper, StoreError};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

/// Pause after a failed accept, so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: ListenAddr, source: io::Error },
}

/// A bound listener of either kind.
enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix { listener: UnixListener, path: PathBuf },
}

/// An accepted client stream of either kind.
enum Accepted {
    Tcp(TcpStream, SocketAddr),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Listener {
    async fn bind(addr: &ListenAddr) -> io::Result<Self> {
        match addr {
            ListenAddr::Tcp(addr) => Ok(Listener::Tcp(TcpListener::bind(addr).await?)),
            #[cfg(unix)]
            ListenAddr::Unix(path) => Ok(Listener::Unix {
                listener: UnixListener::bind(path)?,
                path: path.clone(),
            }),
            #[cfg(not(unix))]
            ListenAddr::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
        }
    }

    async fn accept(&self) -> io::Result<Accepted> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                Ok(Accepted::Tcp(stream, addr))
            }
            #[cfg(unix)]
            Listener::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                Ok(Accepted::Unix(stream))
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Listener::Unix { path, .. } = self {
            if let Err(e) = std::fs::remove_file(&*path) {
                debug!(path = %path.display(), error = %e, "Failed to remove socket file");
            }
        }
    }
}

/// A bound, not yet running server.
pub struct Server {
    listener: Listener,
    listen: ListenAddr,
    ring: Arc<BucketRing>,
    stats: Arc<ConnectionStats>,
    shutdown: Shutdown,
    expiry: ExpiryConfig,
}

impl Server {
    /// Builds the store and binds the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let ring = Arc::new(BucketRing::new(config.shard_count)?);
        info!(shards = ring.shard_count(), "Storage initialized");

        let listener = Listener::bind(&config.listen)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.listen.clone(),
                source,
            })?;

        let listen = match &listener {
            Listener::Tcp(l) => l.local_addr().map(ListenAddr::Tcp).unwrap_or(config.listen),
            #[cfg(unix)]
            Listener::Unix { .. } => config.listen,
        };
        info!(addr = %listen, "Listening");

        Ok(Self {
            listener,
            listen,
            ring,
            stats: Arc::new(ConnectionStats::new()),
            shutdown: Shutdown::new(),
            expiry: ExpiryConfig {
                cycle: config.sweep_cycle,
            },
        })
    }

    /// The bound TCP address, with any ephemeral port resolved.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.listen {
            ListenAddr::Tcp(addr) => Some(addr),
            ListenAddr::Unix(_) => None,
        }
    }

    pub fn listen_addr(&self) -> &ListenAddr {
        &self.listen
    }

    /// The shared store.
    pub fn store(&self) -> Arc<BucketRing> {
        Arc::clone(&self.ring)
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// A handle that stops the server when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Serves clients until shutdown, then waits for every task to finish.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            listen,
            ring,
            stats,
            shutdown,
            expiry,
        } = self;

        let mut tasks = JoinSet::new();
        #[cfg(unix)]
        let mut unix_clients: u64 = 0;
        tasks.spawn(ExpirySweeper::new(Arc::clone(&ring), expiry).run(shutdown.clone()));

        loop {
            // Reap finished connection tasks so the set does not grow
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!(error = %e, "Task failed");
                }
            }

            let accepted = tokio::select! {
                result = listener.accept() => result,
                _ = shutdown.cancelled() => break,
            };

            match accepted {
                Ok(Accepted::Tcp(stream, addr)) => {
                    let handler = CommandHandler::new(Arc::clone(&ring));
                    tasks.spawn(handle_connection(
                        stream,
                        addr,
                        handler,
                        Arc::clone(&stats),
                        shutdown.clone(),
                    ));
                }
                #[cfg(unix)]
                Ok(Accepted::Unix(stream)) => {
                    let handler = CommandHandler::new(Arc::clone(&ring));
                    unix_clients += 1;
                    let peer = format!("{}#{}", listen, unix_clients);
                    tasks.spawn(handle_connection(
                        stream,
                        peer,
                        handler,
                        Arc::clone(&stats),
                        shutdown.clone(),
                    ));
                }
                Err(_) if shutdown.is_triggered() => break,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        info!("Shutdown signal received, stopping server...");
        drop(listener);

        debug!(tasks = tasks.len(), "Waiting for tasks to finish");
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Task failed");
            }
        }

        info!(
            connections = stats.connections_accepted.load(Ordering::Relaxed),
            commands = stats.commands_processed.load(Ordering::Relaxed),
            keys = ring.len(),
            "Server shutdown complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{parse_response, Request, Response};
    use rmpv::Value;
    use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

    fn tcp_config(shards: i64, sweep_cycle: Duration) -> ServerConfig {
        ServerConfig {
            listen: ListenAddr::Tcp("127.0.0.1:0".parse().unwrap()),
            shard_count: shards,
            sweep_cycle,
        }
    }

    async fn roundtrip<S>(client: &mut BufReader<S>, request: Request) -> Response
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        client.write_all(&request.serialize()).await.unwrap();
        let mut line = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), client.read_until(b'\n', &mut line))
            .await
            .unwrap()
            .unwrap();
        parse_response(&line).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_shard_count_aborts_startup() {
        for shards in [0, -4] {
            let result = Server::bind(tcp_config(shards, Duration::from_secs(1))).await;
            assert!(matches!(
                result,
                Err(ServerError::Store(StoreError::InvalidShardCount(n))) if n == shards
            ));
        }
    }

    #[tokio::test]
    async fn test_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            listen: ListenAddr::Tcp(taken.local_addr().unwrap()),
            shard_count: 1,
            sweep_cycle: Duration::from_secs(1),
        };
        assert!(matches!(
            Server::bind(config).await,
            Err(ServerError::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn test_tcp_session_and_shutdown() {
        let server = Server::bind(tcp_config(10, Duration::from_secs(60)))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let running = tokio::spawn(server.run());

        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());

        let set = Request::Set {
            key: "a".into(),
            value: Value::from("1"),
            ttl: 0,
        };
        assert_eq!(roundtrip(&mut client, set).await, Response::Ok);
        assert_eq!(
            roundtrip(&mut client, Request::Get { key: "a".into() }).await,
            Response::Value(Some(Value::from("1")))
        );
        assert_eq!(
            roundtrip(&mut client, Request::Del { key: "a".into() }).await,
            Response::Ok
        );
        assert_eq!(
            roundtrip(&mut client, Request::Get { key: "a".into() }).await,
            Response::Value(None)
        );

        shutdown.trigger();

        // run() returns once the open connection and the sweeper are gone
        tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let mut line = Vec::new();
        assert_eq!(client.read_until(b'\n', &mut line).await.unwrap(), 0);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_with_client_not_reading() {
        let server = Server::bind(tcp_config(4, Duration::from_secs(60)))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        server
            .store()
            .set("big", Value::from("x".repeat(64 * 1024)), 0)
            .unwrap();
        let shutdown = server.shutdown_handle();
        let running = tokio::spawn(server.run());

        // Pipeline far more reply bytes than the socket buffers hold
        let (read_half, mut write_half) = TcpStream::connect(addr).await.unwrap().into_split();
        let writer = tokio::spawn(async move {
            let frame = Request::Get { key: "big".into() }.serialize();
            for _ in 0..400 {
                if write_half.write_all(&frame).await.is_err() {
                    break;
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(3), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        writer.abort();
        drop(read_half);
    }

    #[tokio::test]
    async fn test_idle_server_stops_promptly() {
        let server = Server::bind(tcp_config(4, Duration::from_secs(3600)))
            .await
            .unwrap();
        let shutdown = server.shutdown_handle();
        let running = tokio::spawn(server.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_clients() {
        let server = Server::bind(tcp_config(8, Duration::from_secs(60)))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let ring = server.store();
        let stats = server.stats();
        let shutdown = server.shutdown_handle();
        let running = tokio::spawn(server.run());

        let mut clients = Vec::new();
        for i in 0..8 {
            clients.push(tokio::spawn(async move {
                let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
                for j in 0..25 {
                    let key = format!("client{}-key{}", i, j);
                    let set = Request::Set {
                        key: key.clone(),
                        value: Value::from(j),
                        ttl: 0,
                    };
                    assert_eq!(roundtrip(&mut client, set).await, Response::Ok);
                    assert_eq!(
                        roundtrip(&mut client, Request::Get { key }).await,
                        Response::Value(Some(Value::from(j)))
                    );
                }
            }));
        }
        for client in clients {
            client.await.unwrap();
        }

        assert_eq!(ring.len(), 200);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 400);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_reclaims_expired_entries() {
        let server = Server::bind(tcp_config(2, Duration::from_millis(50)))
            .await
            .unwrap();
        let ring = server.store();
        let shutdown = server.shutdown_handle();
        let running = tokio::spawn(server.run());

        ring.set("short", Value::from("x"), 1).unwrap();
        ring.set("forever", Value::from("y"), 0).unwrap();

        // Expires within 1s, then at most 2 buckets × 50ms to be swept
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(ring.len(), 1);
        assert_eq!(ring.get("forever"), Ok(Value::from("y")));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_socket_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ringkv.sock");
        let config = ServerConfig {
            listen: ListenAddr::Unix(path.clone()),
            shard_count: 3,
            sweep_cycle: Duration::from_secs(60),
        };

        let server = Server::bind(config).await.unwrap();
        assert!(server.local_addr().is_none());
        let shutdown = server.shutdown_handle();
        let running = tokio::spawn(server.run());

        let mut client = BufReader::new(UnixStream::connect(&path).await.unwrap());
        let set = Request::Set {
            key: "sock".into(),
            value: Value::from("ok"),
            ttl: 30,
        };
        assert_eq!(roundtrip(&mut client, set).await, Response::Ok);
        assert_eq!(
            roundtrip(&mut client, Request::Get { key: "sock".into() }).await,
            Response::Value(Some(Value::from("ok")))
        );

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(!path.exists());
    }
}
