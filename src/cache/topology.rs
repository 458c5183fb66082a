//! Cluster Topology Module
//!
//! Decides per call whether the configured nodes form a cluster, and hands
//! out per-node clients for operations that must run on every shard.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::store::StoreClient;

// == Node Descriptor ==
/// Connection parameters for one store node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeDescriptor {
    pub host: String,
    pub port: u16,
    /// Database index selected on connect
    pub db: i64,
}

impl NodeDescriptor {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            db: 0,
        }
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// `redis://host:port/db` form of this node.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses `host:port`.
impl FromStr for NodeDescriptor {
    type Err = CacheError;

    fn from_str(text: &str) -> Result<Self> {
        let invalid = || CacheError::Config(format!("Invalid node address: '{}'", text));
        let (host, port) = text.trim().rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

// == Node Connector ==
/// Opens a client bound to a single node.
pub trait NodeConnector: Send + Sync {
    fn connect(&self, node: &NodeDescriptor) -> Result<Box<dyn StoreClient>>;
}

// == Topology ==
/// Snapshot of the configured nodes and whether they run in cluster mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub nodes: Vec<NodeDescriptor>,
    pub is_cluster: bool,
}

impl Topology {
    pub fn single(nodes: Vec<NodeDescriptor>) -> Self {
        Self {
            nodes,
            is_cluster: false,
        }
    }

    pub fn cluster(nodes: Vec<NodeDescriptor>) -> Self {
        Self {
            nodes,
            is_cluster: true,
        }
    }
}

// == Cluster Topology ==
/// Probes the configured nodes. Holds no state that changes between calls.
pub struct ClusterTopology {
    nodes: Vec<NodeDescriptor>,
    connector: Box<dyn NodeConnector>,
    /// Cluster flag reported without probing
    fixed: Option<bool>,
}

impl ClusterTopology {
    pub fn new(nodes: Vec<NodeDescriptor>, connector: impl NodeConnector + 'static) -> Self {
        Self {
            nodes,
            connector: Box::new(connector),
            fixed: None,
        }
    }

    /// Reports `topology` on every detection instead of probing the nodes.
    pub fn fixed(topology: Topology, connector: impl NodeConnector + 'static) -> Self {
        Self {
            nodes: topology.nodes,
            connector: Box::new(connector),
            fixed: Some(topology.is_cluster),
        }
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    // == Detect ==
    /// Queries every node's cluster status.
    ///
    /// A node that cannot be reached or queried counts as not reporting
    /// cluster mode; detection itself never fails.
    pub fn detect(&self) -> Topology {
        if let Some(is_cluster) = self.fixed {
            return Topology {
                nodes: self.nodes.clone(),
                is_cluster,
            };
        }

        let is_cluster = self.nodes.iter().any(|node| {
            match self
                .connector
                .connect(node)
                .and_then(|client| client.cluster_enabled())
            {
                Ok(enabled) => enabled,
                Err(err) => {
                    warn!(node = %node, error = %err, "Cluster status probe failed");
                    false
                }
            }
        });

        debug!(nodes = self.nodes.len(), is_cluster, "Topology detected");
        Topology {
            nodes: self.nodes.clone(),
            is_cluster,
        }
    }

    // == Fan Out ==
    /// Opens one client per node of `topology`, failing on the first
    /// node that cannot be reached.
    pub fn fan_out(&self, topology: &Topology) -> Result<Vec<Box<dyn StoreClient>>> {
        topology
            .nodes
            .iter()
            .map(|node| self.connector.connect(node))
            .collect()
    }
}

impl fmt::Debug for ClusterTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterTopology")
            .field("nodes", &self.nodes)
            .field("fixed", &self.fixed)
            .finish_non_exhaustive()
    }
}
