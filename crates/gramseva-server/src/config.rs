//! Server configuration.
//!
//! Layered: built-in defaults, then an optional TOML file (`--config`), then
//! command-line flags and `GRAMSEVA_*` environment variables.
//!
//! ```toml
//! bind = "0.0.0.0"
//! port = 3001
//! data_dir = "/var/lib/gramseva"
//! seed_demo = false
//! min_officer_keys = 200
//! broadcast_capacity = 256
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_BROADCAST_CAPACITY, DEFAULT_DATA_DIR, DEFAULT_MIN_OFFICER_KEYS,
    DEFAULT_PORT,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid listen address {0}")]
    Address(String),
}

/// Resolved server settings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Load the demo officers and resident at startup.
    pub seed_demo: bool,
    pub min_officer_keys: usize,
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            seed_demo: false,
            min_officer_keys: DEFAULT_MIN_OFFICER_KEYS,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Defaults with the data directory replaced; handy for tests.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply every layer described in the module docs.
    pub fn resolve(args: &ServerArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        args.apply(&mut config);
        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse().map_err(|_| ConfigError::Address(addr))
    }
}

/// `gramseva-server` command line.
#[derive(Debug, Default, Parser)]
#[command(name = "gramseva-server", version, about = "GramSeva collection store and realtime server")]
pub struct ServerArgs {
    /// TOML config file.
    #[arg(long, env = "GRAMSEVA_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "GRAMSEVA_BIND")]
    pub bind: Option<String>,

    #[arg(long, short, env = "GRAMSEVA_PORT")]
    pub port: Option<u16>,

    /// Directory holding one JSON file per collection.
    #[arg(long, env = "GRAMSEVA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Materialize demo officers and a demo resident.
    #[arg(long, env = "GRAMSEVA_SEED_DEMO")]
    pub seed_demo: bool,

    #[arg(long, env = "GRAMSEVA_MIN_OFFICER_KEYS")]
    pub min_officer_keys: Option<usize>,

    #[arg(long, env = "GRAMSEVA_BROADCAST_CAPACITY")]
    pub broadcast_capacity: Option<usize>,
}

impl ServerArgs {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if self.seed_demo {
            config.seed_demo = true;
        }
        if let Some(n) = self.min_officer_keys {
            config.min_officer_keys = n;
        }
        if let Some(n) = self.broadcast_capacity {
            config.broadcast_capacity = n.max(1);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
