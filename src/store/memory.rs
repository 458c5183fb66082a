//! In-Process Store Module
//!
//! A `StoreClient` keeping entries in a HashMap with lazy TTL expiry.
//! Backs the gateway's `memory` backend and the test suites, which use its
//! failure hooks to simulate nil replies and unreachable nodes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ::redis::{ErrorKind, RedisError};
use tracing::debug;

use super::entry::StoredEntry;
use super::{QueuedCommand, StoreClient, Transaction, TTL_MISSING, TTL_NO_EXPIRY};
use crate::cache::{NodeConnector, NodeDescriptor};
use crate::error::Result;

// == Memory Store ==
/// In-process key-value store with Redis-like command semantics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Key-value storage
    entries: Mutex<HashMap<String, StoredEntry>>,
    /// Reported through `INFO cluster`
    cluster_enabled: AtomicBool,
    /// When set, every command fails as a connection error
    unreachable: AtomicBool,
    /// Keys whose `EXPIRE` answers nil
    failing_expire: Mutex<HashSet<String>>,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that reports cluster mode on `INFO cluster`.
    pub fn cluster_node() -> Self {
        let store = Self::new();
        store.set_cluster_enabled(true);
        store
    }

    pub fn set_cluster_enabled(&self, enabled: bool) {
        self.cluster_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Makes every subsequent command fail with an I/O error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Makes `EXPIRE` on `key` answer nil, inside or outside a transaction.
    pub fn fail_expire_on(&self, key: impl Into<String>) {
        lock(&self.failing_expire).insert(key.into());
    }

    // == Purge Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        lock(&self.entries)
            .values()
            .filter(|entry| !entry.is_expired())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RedisError::from((ErrorKind::IoError, "node unreachable")).into());
        }
        Ok(())
    }

    fn live<'a>(
        entries: &'a mut HashMap<String, StoredEntry>,
        key: &str,
    ) -> Option<&'a mut StoredEntry> {
        if entries.get(key).is_some_and(StoredEntry::is_expired) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    fn apply_expire(&self, entries: &mut HashMap<String, StoredEntry>, key: &str, seconds: u64) -> bool {
        if lock(&self.failing_expire).contains(key) {
            debug!(key, "Injected EXPIRE failure");
            return false;
        }
        match Self::live(entries, key) {
            Some(entry) => {
                entry.expire_in(Some(seconds));
                true
            }
            None => false,
        }
    }

    fn apply_del(entries: &mut HashMap<String, StoredEntry>, keys: &[String]) -> u64 {
        let unique: HashSet<&String> = keys.iter().collect();
        let mut removed = 0;
        for key in unique {
            if Self::live(entries, key).is_some() {
                entries.remove(key.as_str());
                removed += 1;
            }
        }
        removed
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StoreClient for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_reachable()?;
        let mut entries = lock(&self.entries);
        Ok(Self::live(&mut entries, key).map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: &[u8], expire_seconds: Option<u64>) -> Result<bool> {
        self.check_reachable()?;
        lock(&self.entries).insert(key.to_string(), StoredEntry::new(value.to_vec(), expire_seconds));
        Ok(true)
    }

    fn del(&self, keys: &[String]) -> Result<u64> {
        self.check_reachable()?;
        Ok(Self::apply_del(&mut lock(&self.entries), keys))
    }

    fn ttl(&self, key: &str) -> Result<i64> {
        self.check_reachable()?;
        let mut entries = lock(&self.entries);
        Ok(match Self::live(&mut entries, key) {
            None => TTL_MISSING,
            Some(entry) => entry
                .ttl_remaining()
                .map_or(TTL_NO_EXPIRY, |seconds| seconds as i64),
        })
    }

    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.check_reachable()?;
        let mut entries = lock(&self.entries);
        Ok(keys
            .iter()
            .map(|key| Self::live(&mut entries, key).map(|entry| entry.value.clone()))
            .collect())
    }

    fn mset(&self, pairs: &[(String, Vec<u8>)]) -> Result<bool> {
        self.check_reachable()?;
        let mut entries = lock(&self.entries);
        for (key, value) in pairs {
            entries.insert(key.clone(), StoredEntry::new(value.clone(), None));
        }
        Ok(true)
    }

    fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        self.check_reachable()?;
        let mut entries = lock(&self.entries);
        Ok(self.apply_expire(&mut entries, key, seconds))
    }

    fn exec(&self, transaction: &Transaction) -> Result<Option<Vec<bool>>> {
        self.check_reachable()?;
        let mut entries = lock(&self.entries);
        let results = transaction
            .commands()
            .iter()
            .map(|command| match command {
                QueuedCommand::MSet(pairs) => {
                    for (key, value) in pairs {
                        entries.insert(key.clone(), StoredEntry::new(value.clone(), None));
                    }
                    true
                }
                QueuedCommand::Expire { key, seconds } => self.apply_expire(&mut entries, key, *seconds),
            })
            .collect();
        Ok(Some(results))
    }

    fn flush_db(&self) -> Result<bool> {
        self.check_reachable()?;
        lock(&self.entries).clear();
        Ok(true)
    }

    fn cluster_enabled(&self) -> Result<bool> {
        self.check_reachable()?;
        Ok(self.cluster_enabled.load(Ordering::SeqCst))
    }
}

// == Memory Connector ==
/// Resolves node descriptors to registered in-process stores.
#[derive(Debug, Default, Clone)]
pub struct MemoryConnector {
    nodes: HashMap<NodeDescriptor, Arc<MemoryStore>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the store answering for `node`.
    pub fn with_node(mut self, node: NodeDescriptor, store: Arc<MemoryStore>) -> Self {
        self.nodes.insert(node, store);
        self
    }
}

impl NodeConnector for MemoryConnector {
    fn connect(&self, node: &NodeDescriptor) -> Result<Box<dyn StoreClient>> {
        match self.nodes.get(node) {
            Some(store) => Ok(Box::new(Arc::clone(store))),
            None => Err(RedisError::from((
                ErrorKind::IoError,
                "connection refused",
                node.to_string(),
            ))
            .into()),
        }
    }
}
