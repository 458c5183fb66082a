//! Cache Facade Module
//!
//! The public cache operations. Keys are validated before any store command
//! is issued and every write resolves its TTL through `normalize_ttl`.

use std::collections::HashSet;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::codec::{JsonCodec, ValueCodec};
use crate::cache::key::{validate_key, validate_keys};
use crate::cache::topology::{ClusterTopology, Topology};
use crate::cache::ttl::{normalize_ttl, NormalizedTtl, Ttl};
use crate::error::{CacheError, Result};
use crate::store::{StoreClient, Transaction, TTL_NO_EXPIRY};

// == Cache Facade ==
/// Uniform get/set/delete/batch operations over a key-value store.
///
/// Holds no mutable state: the topology is probed again by every operation
/// that depends on it, so one instance can be shared across threads.
pub struct CacheFacade<C: ValueCodec = JsonCodec> {
    /// Client routing single-key and batch commands
    client: Box<dyn StoreClient>,
    topology: ClusterTopology,
    codec: C,
}

impl CacheFacade<JsonCodec> {
    // == Constructor ==
    pub fn new(client: impl StoreClient + 'static, topology: ClusterTopology) -> Self {
        Self::with_codec(client, topology, JsonCodec)
    }
}

impl<C: ValueCodec> CacheFacade<C> {
    pub fn with_codec(client: impl StoreClient + 'static, topology: ClusterTopology, codec: C) -> Self {
        Self {
            client: Box::new(client),
            topology,
            codec,
        }
    }

    /// Current topology, probed on each call.
    pub fn topology(&self) -> Topology {
        self.topology.detect()
    }

    // == Get ==
    /// Reads `key`, returning `default` when it is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.fetch(key)?.unwrap_or(default))
    }

    /// Reads `key`, returning `None` when it is absent.
    pub fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        validate_key(key)?;
        debug!(key, "get");
        self.client
            .get(key)?
            .map(|bytes| self.codec.decode(&bytes))
            .transpose()
    }

    // == Set ==
    /// Writes `value` under `key`. A TTL that is already expired deletes the
    /// key instead and returns the delete's outcome.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Ttl>) -> Result<bool> {
        validate_key(key)?;
        let ttl = normalize_ttl(ttl.as_ref());
        if ttl.is_expired() {
            debug!(key, "set with expired ttl, deleting");
            return self.delete(key);
        }

        let bytes = self.codec.encode(value)?;
        debug!(key, ttl = ?ttl, "set");
        self.client.set(key, &bytes, ttl.as_seconds())
    }

    // == Delete ==
    /// Removes `key`. Deleting an absent key succeeds.
    pub fn delete(&self, key: &str) -> Result<bool> {
        if !self.has(key)? {
            return Ok(true);
        }
        debug!(key, "delete");
        Ok(self.client.del(&[key.to_string()])? == 1)
    }

    // == Has ==
    /// True when `key` exists, with or without an expiry.
    pub fn has(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let remaining = self.client.ttl(key)?;
        Ok(remaining > 0 || remaining == TTL_NO_EXPIRY)
    }

    // == Clear ==
    /// Flushes the keyspace. In a cluster every node is flushed on its own;
    /// the call is `true` only when all of them acknowledge, and a node
    /// failing after another was flushed makes it `false`.
    pub fn clear(&self) -> Result<bool> {
        let topology = self.topology.detect();
        if !topology.is_cluster {
            debug!("clear single node");
            return self.client.flush_db();
        }

        let clients = self.topology.fan_out(&topology)?;
        let mut outcome = PartialOutcome::default();
        for (node, client) in topology.nodes.iter().zip(clients) {
            let flushed = client.flush_db();
            match &flushed {
                Ok(false) => warn!(node = %node, "FLUSHDB was not acknowledged"),
                Err(err) => warn!(node = %node, error = %err, "FLUSHDB failed"),
                Ok(true) => {}
            }
            outcome.record(flushed);
        }
        debug!(nodes = topology.nodes.len(), "clear cluster");
        outcome.finish()
    }

    // == Get Multiple ==
    /// Reads every key in order, one output entry per requested key, with
    /// `default` standing in for misses.
    pub fn get_multiple<K, T>(&self, keys: impl IntoIterator<Item = K>, default: T) -> Result<Vec<(String, T)>>
    where
        K: Into<String>,
        T: DeserializeOwned + Clone,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        validate_keys(&keys)?;

        if self.topology.detect().is_cluster {
            debug!(keys = keys.len(), "get_multiple per key (cluster)");
            return keys
                .into_iter()
                .map(|key| {
                    let value = self.fetch(&key)?.unwrap_or_else(|| default.clone());
                    Ok((key, value))
                })
                .collect();
        }

        debug!(keys = keys.len(), "get_multiple via MGET");
        let found = self.client.mget(&keys)?;
        let mut found = found.into_iter();
        keys.into_iter()
            .map(|key| {
                let value = match found.next().flatten() {
                    Some(bytes) => self.codec.decode(&bytes)?,
                    None => default.clone(),
                };
                Ok((key, value))
            })
            .collect()
    }

    // == Set Multiple ==
    /// Writes every pair with one shared TTL.
    ///
    /// On a single node a finite TTL runs `MSET` plus one `EXPIRE` per key in
    /// a transaction; any nil reply makes the call return `false`. In a
    /// cluster the pairs are written one by one and the call is not atomic:
    /// a failed write after others succeeded makes it `false`.
    pub fn set_multiple<K, V>(&self, values: impl IntoIterator<Item = (K, V)>, ttl: Option<Ttl>) -> Result<bool>
    where
        K: Into<String>,
        V: Serialize,
    {
        let values: Vec<(String, V)> = values.into_iter().map(|(key, value)| (key.into(), value)).collect();
        let keys: Vec<String> = values.iter().map(|(key, _)| key.clone()).collect();
        validate_keys(&keys)?;

        let ttl = normalize_ttl(ttl.as_ref());
        if ttl.is_expired() {
            debug!(keys = keys.len(), "set_multiple with expired ttl, deleting");
            return self.delete_multiple(keys);
        }

        let pairs = values
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.codec.encode(value)?)))
            .collect::<Result<Vec<(String, Vec<u8>)>>>()?;

        if self.topology.detect().is_cluster {
            debug!(keys = keys.len(), "set_multiple per key (cluster)");
            let mut outcome = PartialOutcome::default();
            for (key, bytes) in &pairs {
                let written = self.client.set(key, bytes, ttl.as_seconds());
                if let Err(err) = &written {
                    warn!(key = key.as_str(), error = %err, "SET failed");
                }
                outcome.record(written);
            }
            return outcome.finish();
        }

        let seconds = match ttl {
            NormalizedTtl::AbsoluteSeconds(seconds) => seconds,
            _ => {
                debug!(keys = keys.len(), "set_multiple via MSET");
                return self.client.mset(&pairs);
            }
        };

        let mut transaction = Transaction::new();
        transaction.mset(pairs);
        for key in &keys {
            transaction.expire(key.as_str(), seconds);
        }

        debug!(keys = keys.len(), seconds, "set_multiple via MULTI/EXEC");
        match self.client.exec(&transaction)? {
            Some(results) if results.iter().all(|ok| *ok) => Ok(true),
            Some(results) => {
                let failed = results.iter().filter(|ok| !**ok).count();
                warn!(failed, queued = transaction.len(), "Transaction reported nil replies");
                Ok(false)
            }
            None => {
                warn!("Transaction aborted");
                Ok(false)
            }
        }
    }

    // == Delete Multiple ==
    /// Removes the keys that currently exist. True when every one of them
    /// was removed; an input with no existing keys succeeds trivially.
    pub fn delete_multiple<K>(&self, keys: impl IntoIterator<Item = K>) -> Result<bool>
    where
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.iter().try_for_each(|key| validate_key(key))?;

        let mut seen = HashSet::new();
        let mut present = Vec::new();
        for key in keys {
            if seen.insert(key.clone()) && self.has(&key)? {
                present.push(key);
            }
        }

        if present.is_empty() {
            return Ok(true);
        }
        debug!(keys = present.len(), "delete_multiple");
        Ok(self.client.del(&present)? == present.len() as u64)
    }
}

// == Partial Outcome ==
/// Outcome of a non-atomic operation made of independent steps.
///
/// Once any step has been applied, later failures are reported as `false`.
/// An error is returned only when no step was applied.
#[derive(Default)]
struct PartialOutcome {
    applied: bool,
    failed: bool,
    first_error: Option<CacheError>,
}

impl PartialOutcome {
    fn record(&mut self, step: Result<bool>) {
        match step {
            Ok(true) => self.applied = true,
            Ok(false) => self.failed = true,
            Err(err) => {
                self.failed = true;
                if self.first_error.is_none() {
                    self.first_error = Some(err);
                }
            }
        }
    }

    fn finish(self) -> Result<bool> {
        match self.first_error {
            Some(err) if !self.applied => Err(err),
            _ => Ok(!self.failed),
        }
    }
}

impl<C: ValueCodec> std::fmt::Debug for CacheFacade<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFacade")
            .field("topology", &self.topology)
            .finish_non_exhaustive()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{NodeDescriptor, RelativeInterval};
    use crate::error::CacheError;
    use crate::store::{MemoryConnector, MemoryStore};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn single() -> (CacheFacade, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let node = NodeDescriptor::new("127.0.0.1", 6379);
        let connector = MemoryConnector::new().with_node(node.clone(), Arc::clone(&store));
        let topology = ClusterTopology::new(vec![node], connector);
        (CacheFacade::new(Arc::clone(&store), topology), store)
    }

    #[test]
    fn test_set_and_get() {
        let (cache, _) = single();

        assert!(cache.set("test_string", "a", None).unwrap());
        assert_eq!(cache.get("test_string", String::from("default")).unwrap(), "a");
        assert_eq!(cache.get("missing", String::from("default")).unwrap(), "default");
    }

    #[test]
    fn test_set_twice_overwrites() {
        let (cache, _) = single();

        assert!(cache.set("k", &1, None).unwrap());
        assert!(cache.set("k", &2, Some(Ttl::Seconds(3600))).unwrap());
        assert_eq!(cache.get("k", 0).unwrap(), 2);
    }

    #[test]
    fn test_set_with_ttl_attaches_expiry() {
        let (cache, store) = single();

        cache.set("k", "v", Some(Ttl::Seconds(60))).unwrap();
        let remaining = store.ttl("k").unwrap();
        assert!(remaining > 0 && remaining <= 60);

        cache
            .set("i", "v", Some(RelativeInterval::new().minutes(2).into()))
            .unwrap();
        assert!(store.ttl("i").unwrap() > 60);
    }

    #[test]
    fn test_expired_ttl_deletes() {
        let (cache, store) = single();
        cache.set("a", &1, None).unwrap();

        assert!(cache.set("a", &1, Some(Ttl::Seconds(-1))).unwrap());
        assert!(!cache.has("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);

        assert!(cache.set("b", &2, Some(Ttl::Seconds(0))).unwrap());
        assert!(!cache.has("b").unwrap());
        assert_eq!(cache.get("b", Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_delete_and_has_nonexistent() {
        let (cache, _) = single();

        assert!(!cache.has("nope").unwrap());
        assert!(cache.delete("nope").unwrap());
    }

    #[test]
    fn test_delete_existing() {
        let (cache, _) = single();
        cache.set("k", &json!({"a": 1}), None).unwrap();

        assert!(cache.has("k").unwrap());
        assert!(cache.delete("k").unwrap());
        assert!(!cache.has("k").unwrap());
    }

    #[test]
    fn test_clear_single_node() {
        let (cache, store) = single();
        cache.set("a", &1, None).unwrap();
        cache.set("b", &2, None).unwrap();

        assert!(cache.clear().unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_multiple_preserves_order_and_defaults() {
        let (cache, _) = single();
        cache.set("a", &1, None).unwrap();
        cache.set("c", &3, None).unwrap();

        let values = cache.get_multiple(["c", "b", "a", "c"], -1).unwrap();
        assert_eq!(
            values,
            vec![
                ("c".to_string(), 3),
                ("b".to_string(), -1),
                ("a".to_string(), 1),
                ("c".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_set_multiple_infinite() {
        let (cache, store) = single();

        assert!(cache.set_multiple([("a", 1), ("b", 2)], None).unwrap());
        assert_eq!(store.ttl("a").unwrap(), TTL_NO_EXPIRY);
        assert_eq!(cache.get("b", 0).unwrap(), 2);
    }

    #[test]
    fn test_set_multiple_finite_ttl_uses_transaction() {
        let (cache, store) = single();

        assert!(cache.set_multiple([("a", 1), ("b", 2)], Some(Ttl::Seconds(120))).unwrap());
        for key in ["a", "b"] {
            let remaining = store.ttl(key).unwrap();
            assert!(remaining > 0 && remaining <= 120);
        }
    }

    #[test]
    fn test_set_multiple_transaction_failure_returns_false() {
        let (cache, store) = single();
        store.fail_expire_on("key");

        let result = cache.set_multiple([("key", "value")], Some(Ttl::Seconds(3600)));
        assert!(!result.unwrap());
    }

    #[test]
    fn test_set_multiple_expired_ttl_deletes() {
        let (cache, _) = single();
        cache.set_multiple([("a", 1), ("b", 2)], None).unwrap();

        assert!(cache.set_multiple([("a", 1), ("b", 2)], Some(Ttl::Seconds(-1))).unwrap());
        assert!(!cache.has("a").unwrap());
        assert!(!cache.has("b").unwrap());
    }

    #[test]
    fn test_delete_multiple_mixed() {
        let (cache, _) = single();
        cache.set_multiple([("a", 1), ("b", 2)], None).unwrap();

        assert!(cache.delete_multiple(["a", "missing", "b", "a"]).unwrap());
        assert!(!cache.has("a").unwrap());
        assert!(!cache.has("b").unwrap());
    }

    #[test]
    fn test_delete_multiple_nothing_present() {
        let (cache, _) = single();
        assert!(cache.delete_multiple(["x", "y"]).unwrap());
        assert!(cache.delete_multiple(Vec::<String>::new()).unwrap());
    }

    #[test]
    fn test_invalid_keys_rejected_everywhere() {
        let (cache, _) = single();
        let bad = "a:b";

        assert!(matches!(cache.get(bad, 0), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.set(bad, &1, None), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.set(bad, &1, Some(Ttl::Seconds(0))), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.delete(bad), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.has(bad), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.get_multiple([bad], 0), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.set_multiple([(bad, 1)], None), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.delete_multiple([bad]), Err(CacheError::InvalidKey(_))));
    }

    #[test]
    fn test_empty_batches_rejected() {
        let (cache, _) = single();

        assert!(matches!(
            cache.get_multiple(Vec::<String>::new(), 0),
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(
            cache.set_multiple(Vec::<(String, i32)>::new(), None),
            Err(CacheError::InvalidKey(_))
        ));
    }

    /// Cluster-mode store whose `SET` fails for one key.
    struct FailingSetStore {
        inner: MemoryStore,
        failing_key: &'static str,
    }

    impl StoreClient for FailingSetStore {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8], expire_seconds: Option<u64>) -> Result<bool> {
            if key == self.failing_key {
                return Err(::redis::RedisError::from((::redis::ErrorKind::IoError, "connection reset")).into());
            }
            self.inner.set(key, value, expire_seconds)
        }

        fn del(&self, keys: &[String]) -> Result<u64> {
            self.inner.del(keys)
        }

        fn ttl(&self, key: &str) -> Result<i64> {
            self.inner.ttl(key)
        }

        fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
            self.inner.mget(keys)
        }

        fn mset(&self, pairs: &[(String, Vec<u8>)]) -> Result<bool> {
            self.inner.mset(pairs)
        }

        fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
            self.inner.expire(key, seconds)
        }

        fn exec(&self, transaction: &Transaction) -> Result<Option<Vec<bool>>> {
            self.inner.exec(transaction)
        }

        fn flush_db(&self) -> Result<bool> {
            self.inner.flush_db()
        }

        fn cluster_enabled(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn cluster_with_failing_key(failing_key: &'static str) -> CacheFacade {
        let store = FailingSetStore {
            inner: MemoryStore::new(),
            failing_key,
        };
        let topology = ClusterTopology::fixed(Topology::cluster(Vec::new()), MemoryConnector::new());
        CacheFacade::new(store, topology)
    }

    #[test]
    fn test_cluster_set_multiple_partial_failure_returns_false() {
        let cache = cluster_with_failing_key("bad");

        let result = cache.set_multiple([("a", 1), ("bad", 2), ("c", 3)], Some(Ttl::Seconds(60)));
        assert!(!result.unwrap());
        assert_eq!(cache.get("a", 0).unwrap(), 1);
        assert_eq!(cache.get("c", 0).unwrap(), 3);
    }

    #[test]
    fn test_cluster_set_multiple_total_failure_is_an_error() {
        let cache = cluster_with_failing_key("bad");

        let result = cache.set_multiple([("bad", 1)], None);
        assert!(matches!(result, Err(CacheError::Store(_))));
    }

    #[test]
    fn test_partial_outcome() {
        let io_error = || CacheError::from(::redis::RedisError::from((::redis::ErrorKind::IoError, "down")));

        let mut outcome = PartialOutcome::default();
        outcome.record(Ok(true));
        outcome.record(Ok(true));
        assert!(outcome.finish().unwrap());

        let mut outcome = PartialOutcome::default();
        outcome.record(Ok(true));
        outcome.record(Err(io_error()));
        assert!(!outcome.finish().unwrap());

        let mut outcome = PartialOutcome::default();
        outcome.record(Ok(false));
        assert!(!outcome.finish().unwrap());

        let mut outcome = PartialOutcome::default();
        outcome.record(Ok(false));
        outcome.record(Err(io_error()));
        assert!(matches!(outcome.finish(), Err(CacheError::Store(_))));
    }

    #[test]
    fn test_non_finite_float_is_not_stored() {
        let (cache, store) = single();

        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(cache.set("f", &value, None), Err(CacheError::Codec(_))));
            assert!(matches!(
                cache.set_multiple([("f", value)], Some(Ttl::Seconds(60))),
                Err(CacheError::Codec(_))
            ));
        }
        assert!(store.is_empty());

        assert!(cache.set("f", &-0.25f64, None).unwrap());
        assert_eq!(cache.get("f", 0.0f64).unwrap(), -0.25);
    }

    #[test]
    fn test_store_errors_propagate() {
        let (cache, store) = single();
        store.set_unreachable(true);

        assert!(matches!(cache.get("k", 0), Err(CacheError::Store(_))));
        assert!(matches!(cache.set("k", &1, None), Err(CacheError::Store(_))));
    }
}
