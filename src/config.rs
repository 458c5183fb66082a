//! Configuration Module
//!
//! Handles loading and managing gateway configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::NodeDescriptor;
use crate::error::{CacheError, Result};

/// Store backend behind the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Redis server or cluster
    Redis,
    /// In-process store
    Memory,
}

impl FromStr for Backend {
    type Err = CacheError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Backend::Redis),
            "memory" => Ok(Backend::Memory),
            other => Err(CacheError::Config(format!("Unknown backend: '{}'", other))),
        }
    }
}

/// Gateway configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store backend
    pub backend: Backend,
    /// Comma-separated `host:port` node list
    pub redis_nodes: String,
    /// Database index used in single-node mode
    pub redis_db: i64,
    /// Route commands through a cluster-aware client
    pub redis_cluster: bool,
    /// HTTP server port
    pub server_port: u16,
    /// Expired entry purge interval in seconds (memory backend)
    pub purge_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `redis` or `memory` (default: redis)
    /// - `REDIS_NODES` - Node list (default: 127.0.0.1:6379)
    /// - `REDIS_DB` - Database index (default: 0)
    /// - `REDIS_CLUSTER` - Cluster routing (default: false)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `PURGE_INTERVAL` - Purge frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env_parse("CACHE_BACKEND").unwrap_or(defaults.backend),
            redis_nodes: env::var("REDIS_NODES").unwrap_or(defaults.redis_nodes),
            redis_db: env_parse("REDIS_DB").unwrap_or(defaults.redis_db),
            redis_cluster: env_parse("REDIS_CLUSTER").unwrap_or(defaults.redis_cluster),
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
            purge_interval: env_parse("PURGE_INTERVAL").unwrap_or(defaults.purge_interval),
        }
    }

    /// Parses the configured node list.
    pub fn nodes(&self) -> Result<Vec<NodeDescriptor>> {
        let nodes = self
            .redis_nodes
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| entry.parse::<NodeDescriptor>().map(|node| node.with_db(self.redis_db)))
            .collect::<Result<Vec<_>>>()?;

        if nodes.is_empty() {
            return Err(CacheError::Config("REDIS_NODES is empty".to_string()));
        }
        Ok(nodes)
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Redis,
            redis_nodes: "127.0.0.1:6379".to_string(),
            redis_db: 0,
            redis_cluster: false,
            server_port: 3000,
            purge_interval: 1,
        }
    }
}
