//! Redis Store Module
//!
//! `StoreClient` over the `redis` crate. A store either talks to one node or
//! routes every command through a cluster-aware client.

use std::sync::{Mutex, PoisonError};

use ::redis::cluster::ClusterClient;
use ::redis::{Client, Cmd, ConnectionLike, FromRedisValue, Pipeline, RedisResult, Value};
use tracing::{debug, warn};

use super::{QueuedCommand, StoreClient, Transaction};
use crate::cache::{NodeConnector, NodeDescriptor};
use crate::error::Result;

enum Backend {
    Single(Client),
    Cluster(ClusterClient),
}

type SharedConnection = Box<dyn ConnectionLike + Send>;

// == Redis Store ==
/// Store client backed by a Redis server or cluster.
///
/// Commands share one lazily opened connection, serialized by a mutex. A
/// connection that fails with an I/O error is dropped and reopened by the
/// next command.
pub struct RedisStore {
    backend: Backend,
    connection: Mutex<Option<SharedConnection>>,
    description: String,
}

impl RedisStore {
    /// Client bound to a single node.
    pub fn open(node: &NodeDescriptor) -> Result<Self> {
        Ok(Self::with_backend(
            Backend::Single(Client::open(node.url())?),
            node.to_string(),
        ))
    }

    /// Client routing each command to the cluster node owning its key.
    pub fn open_cluster(nodes: &[NodeDescriptor]) -> Result<Self> {
        let urls: Vec<String> = nodes.iter().map(NodeDescriptor::url).collect();
        Ok(Self::with_backend(
            Backend::Cluster(ClusterClient::new(urls)?),
            format!("cluster of {} seed nodes", nodes.len()),
        ))
    }

    fn with_backend(backend: Backend, description: String) -> Self {
        Self {
            backend,
            connection: Mutex::new(None),
            description,
        }
    }

    fn connect(&self) -> RedisResult<SharedConnection> {
        debug!(target = %self.description, "Opening connection");
        Ok(match &self.backend {
            Backend::Single(client) => Box::new(client.get_connection()?),
            Backend::Cluster(client) => Box::new(client.get_connection()?),
        })
    }

    /// Runs `command` on the shared connection, opening it if needed.
    fn with_connection<T>(&self, command: impl FnOnce(&mut dyn ConnectionLike) -> RedisResult<T>) -> Result<T> {
        let mut slot = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        let connection = match &mut *slot {
            Some(connection) => connection,
            empty => empty.insert(self.connect()?),
        };

        let result = command(&mut **connection);
        if let Err(err) = &result {
            if err.is_io_error() || err.is_connection_dropped() {
                warn!(target = %self.description, error = %err, "Dropping broken connection");
                *slot = None;
            }
        }
        Ok(result?)
    }

    fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
        self.with_connection(|connection| cmd.query(connection))
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("target", &self.description)
            .finish()
    }
}

// == Command Builders ==
fn set_cmd(key: &str, value: &[u8], expire_seconds: Option<u64>) -> Cmd {
    let mut cmd = ::redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(seconds) = expire_seconds {
        cmd.arg("EX").arg(seconds);
    }
    cmd
}

fn mset_cmd(pairs: &[(String, Vec<u8>)]) -> Cmd {
    let mut cmd = ::redis::cmd("MSET");
    for (key, value) in pairs {
        cmd.arg(key.as_str()).arg(value.as_slice());
    }
    cmd
}

fn expire_cmd(key: &str, seconds: u64) -> Cmd {
    let mut cmd = ::redis::cmd("EXPIRE");
    cmd.arg(key).arg(seconds);
    cmd
}

fn del_cmd(keys: &[String]) -> Cmd {
    let mut cmd = ::redis::cmd("DEL");
    cmd.arg(keys);
    cmd
}

fn queued_cmd(command: &QueuedCommand) -> Cmd {
    match command {
        QueuedCommand::MSet(pairs) => mset_cmd(pairs),
        QueuedCommand::Expire { key, seconds } => expire_cmd(key, *seconds),
    }
}

/// True when an `INFO cluster` reply carries `cluster_enabled:1`.
fn parse_cluster_enabled(info: &str) -> bool {
    info.lines()
        .filter_map(|line| line.trim().split_once(':'))
        .any(|(field, value)| field == "cluster_enabled" && value.trim() == "1")
}

/// Reply flag for a queued command; only nil counts as failure.
fn reply_ok(value: &Value) -> bool {
    !matches!(value, Value::Nil)
}

impl StoreClient for RedisStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.query(::redis::cmd("GET").arg(key))
    }

    fn set(&self, key: &str, value: &[u8], expire_seconds: Option<u64>) -> Result<bool> {
        let reply: Option<String> = self.query(&set_cmd(key, value, expire_seconds))?;
        Ok(reply.is_some())
    }

    fn del(&self, keys: &[String]) -> Result<u64> {
        self.query(&del_cmd(keys))
    }

    fn ttl(&self, key: &str) -> Result<i64> {
        self.query(::redis::cmd("TTL").arg(key))
    }

    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.query(::redis::cmd("MGET").arg(keys))
    }

    fn mset(&self, pairs: &[(String, Vec<u8>)]) -> Result<bool> {
        let reply: Option<String> = self.query(&mset_cmd(pairs))?;
        Ok(reply.is_some())
    }

    fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let reply: i64 = self.query(&expire_cmd(key, seconds))?;
        Ok(reply == 1)
    }

    fn exec(&self, transaction: &Transaction) -> Result<Option<Vec<bool>>> {
        let mut pipeline = Pipeline::new();
        pipeline.atomic();
        for command in transaction.commands() {
            pipeline.add_command(queued_cmd(command));
        }

        debug!(queued = transaction.len(), target = %self.description, "MULTI/EXEC");
        let replies: Option<Vec<Value>> = self.with_connection(|connection| pipeline.query(connection))?;
        Ok(replies.map(|replies| replies.iter().map(reply_ok).collect()))
    }

    fn flush_db(&self) -> Result<bool> {
        let reply: Option<String> = self.query(&::redis::cmd("FLUSHDB"))?;
        Ok(reply.is_some())
    }

    fn cluster_enabled(&self) -> Result<bool> {
        let info: String = self.query(::redis::cmd("INFO").arg("cluster"))?;
        Ok(parse_cluster_enabled(&info))
    }
}

// == Redis Connector ==
/// Opens single-node Redis clients for topology probing and fan-out.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisConnector;

impl NodeConnector for RedisConnector {
    fn connect(&self, node: &NodeDescriptor) -> Result<Box<dyn StoreClient>> {
        Ok(Box::new(RedisStore::open(node)?))
    }
}
