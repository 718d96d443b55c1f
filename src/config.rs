//! Server configuration.
//!
//! Settings come from an optional TOML file, with command-line flags layered
//! on top by the server binary. Every key is optional:
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 6700
//! sock = ""            # non-empty: listen on this Unix socket instead
//! bucket_num = 10      # shard count, fixed for the process lifetime
//! gc_cycle = 10        # seconds between two expiry sweeps
//! log_level = "info"
//! ```

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// The default port ringkv listens on
pub const DEFAULT_PORT: u16 = 6700;

/// The default number of buckets
pub const DEFAULT_BUCKET_NUM: i64 = 10;

/// The default sweep cycle, in seconds
pub const DEFAULT_GC_CYCLE: u64 = 10;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// File and flag level settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind the TCP listener to
    pub host: IpAddr,
    /// TCP port, used when `sock` is unset
    pub port: u16,
    /// Unix socket path; takes precedence over TCP when non-empty
    pub sock: Option<PathBuf>,
    /// Number of buckets (must be > 0)
    pub bucket_num: i64,
    /// Seconds between expiry sweeps (must be > 0)
    pub gc_cycle: u64,
    /// Default log filter
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            sock: None,
            bucket_num: DEFAULT_BUCKET_NUM,
            gc_cycle: DEFAULT_GC_CYCLE,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads and parses a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Checks settings that can be rejected before the server starts.
    ///
    /// The bucket count is checked by the ring itself when the server binds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gc_cycle == 0 {
            return Err(ConfigError::Invalid("gc_cycle must be at least 1 second".into()));
        }
        Ok(())
    }

    /// Where the server should listen.
    pub fn listen_addr(&self) -> ListenAddr {
        match &self.sock {
            Some(path) if !path.as_os_str().is_empty() => ListenAddr::Unix(path.clone()),
            _ => ListenAddr::Tcp(SocketAddr::new(self.host, self.port)),
        }
    }

    /// Validates and converts into the runtime server settings.
    pub fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        self.validate()?;
        Ok(ServerConfig {
            listen: self.listen_addr(),
            shard_count: self.bucket_num,
            sweep_cycle: Duration::from_secs(self.gc_cycle),
        })
    }
}

/// A listening endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Tcp(addr) => write!(f, "{}", addr),
            ListenAddr::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Runtime settings consumed by [`Server::bind`](crate::server::Server::bind).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: ListenAddr,
    /// Number of buckets; zero or negative fails at bind time
    pub shard_count: i64,
    /// Interval between two single-bucket sweeps
    pub sweep_cycle: Duration,
}
