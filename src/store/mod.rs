//! Store Module
//!
//! The narrow command interface the facade drives, plus its backends.
//!
//! # Backends
//! - `RedisStore`: a Redis server or cluster through the `redis` crate
//! - `MemoryStore`: an in-process store with the same TTL semantics

mod entry;
pub mod memory;
pub mod redis;

pub use self::memory::{MemoryConnector, MemoryStore};
pub use self::redis::{RedisConnector, RedisStore};

use crate::error::Result;

/// `TTL` reply for a key that exists without an expiry.
pub const TTL_NO_EXPIRY: i64 = -1;

/// `TTL` reply for a key that does not exist.
pub const TTL_MISSING: i64 = -2;

// == Store Client ==
/// Commands required from a key-value store.
///
/// Implementations report store failures as errors; a `false` acknowledgement
/// means the store answered with a nil reply.
pub trait StoreClient: Send + Sync {
    /// `GET key`
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// `SET key value [EX seconds]`
    fn set(&self, key: &str, value: &[u8], expire_seconds: Option<u64>) -> Result<bool>;

    /// `DEL key [key ...]`, returning the number of keys removed
    fn del(&self, keys: &[String]) -> Result<u64>;

    /// `TTL key`: remaining seconds, [`TTL_NO_EXPIRY`] or [`TTL_MISSING`]
    fn ttl(&self, key: &str) -> Result<i64>;

    /// `MGET key [key ...]`, one slot per requested key
    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// `MSET key value [key value ...]`
    fn mset(&self, pairs: &[(String, Vec<u8>)]) -> Result<bool>;

    /// `EXPIRE key seconds`
    fn expire(&self, key: &str, seconds: u64) -> Result<bool>;

    /// `MULTI`, the queued commands, `EXEC`.
    ///
    /// Returns `None` when the transaction was aborted, otherwise one flag
    /// per queued command where `false` marks a nil reply.
    fn exec(&self, transaction: &Transaction) -> Result<Option<Vec<bool>>>;

    /// `FLUSHDB` on the connected node
    fn flush_db(&self) -> Result<bool>;

    /// `INFO cluster`, true when the node reports `cluster_enabled:1`
    fn cluster_enabled(&self) -> Result<bool>;
}

impl<S: StoreClient + ?Sized> StoreClient for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8], expire_seconds: Option<u64>) -> Result<bool> {
        (**self).set(key, value, expire_seconds)
    }

    fn del(&self, keys: &[String]) -> Result<u64> {
        (**self).del(keys)
    }

    fn ttl(&self, key: &str) -> Result<i64> {
        (**self).ttl(key)
    }

    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        (**self).mget(keys)
    }

    fn mset(&self, pairs: &[(String, Vec<u8>)]) -> Result<bool> {
        (**self).mset(pairs)
    }

    fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        (**self).expire(key, seconds)
    }

    fn exec(&self, transaction: &Transaction) -> Result<Option<Vec<bool>>> {
        (**self).exec(transaction)
    }

    fn flush_db(&self) -> Result<bool> {
        (**self).flush_db()
    }

    fn cluster_enabled(&self) -> Result<bool> {
        (**self).cluster_enabled()
    }
}

// == Transaction ==
/// A command queued inside `MULTI`/`EXEC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedCommand {
    MSet(Vec<(String, Vec<u8>)>),
    Expire {
        key: String,
        seconds: u64,
    },
}

/// Ordered queue of commands committed as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    commands: Vec<QueuedCommand>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mset(&mut self, pairs: Vec<(String, Vec<u8>)>) -> &mut Self {
        self.commands.push(QueuedCommand::MSet(pairs));
        self
    }

    pub fn expire(&mut self, key: impl Into<String>, seconds: u64) -> &mut Self {
        self.commands.push(QueuedCommand::Expire {
            key: key.into(),
            seconds,
        });
        self
    }

    pub fn commands(&self) -> &[QueuedCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
