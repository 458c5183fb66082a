//! Integration Tests for the Cache Facade
//!
//! Drives the facade against in-process stores in single-node and cluster
//! topologies. Tests marked `#[ignore]` need a live Redis at `REDIS_NODES`.

use std::sync::Arc;

use redis_facade::cache::{CacheFacade, ClusterTopology, NodeDescriptor, RelativeInterval, Topology, Ttl};
use redis_facade::store::{MemoryConnector, MemoryStore, RedisConnector, RedisStore, StoreClient};
use redis_facade::CacheError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// == Helper Functions ==

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TestObject {
    test_field: String,
}

fn node(port: u16) -> NodeDescriptor {
    NodeDescriptor::new("redis", port)
}

fn single_node() -> (CacheFacade, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let connector = MemoryConnector::new().with_node(node(6379), Arc::clone(&store));
    let cache = CacheFacade::new(Arc::clone(&store), ClusterTopology::new(vec![node(6379)], connector));
    (cache, store)
}

/// Three shards reporting cluster mode. Commands are routed to the first.
fn cluster() -> (CacheFacade, Vec<Arc<MemoryStore>>) {
    let shards: Vec<Arc<MemoryStore>> = (0..3).map(|_| Arc::new(MemoryStore::cluster_node())).collect();
    let nodes: Vec<NodeDescriptor> = (0..3).map(|i| node(6381 + i)).collect();
    let connector = nodes
        .iter()
        .zip(&shards)
        .fold(MemoryConnector::new(), |connector, (node, shard)| {
            connector.with_node(node.clone(), Arc::clone(shard))
        });
    let cache = CacheFacade::new(Arc::clone(&shards[0]), ClusterTopology::new(nodes, connector));
    (cache, shards)
}

fn data_provider() -> Vec<(&'static str, Value)> {
    vec![
        ("test_integer", json!(1)),
        ("test_double", json!(1.1)),
        ("test_string", json!("a")),
        ("test_boolean_true", json!(true)),
        ("test_boolean_false", json!(false)),
        ("test_object", json!({"test_field": "test_value"})),
        ("test_array", json!(["test_key", "test_value"])),
        ("test_null", Value::Null),
        ("AZaz09_.", json!("b")),
        (
            "bVGEIeslJXtDPrtK.hgo6HL25_.1BGmzo4VA25YKHveHh7v9tUP8r5BNCyLhx4zy",
            json!("c"),
        ),
        ("111", json!(11)),
        ("022", json!(22)),
    ]
}

const INVALID_KEYS: [&str; 9] = ["", "{", "}", "(", ")", "/", "\\", "@", ":"];

// == Single Node ==

#[test]
fn test_set_and_get_every_value_kind() {
    let (cache, _) = single_node();

    for (key, value) in data_provider() {
        for _ in 0..2 {
            assert!(cache.set(key, &value, None).unwrap());
            assert!(cache.set(key, &value, Some(Ttl::Seconds(3600))).unwrap());
        }
        let from_cache: Value = cache.get(key, json!("default")).unwrap();
        assert_eq!(from_cache, value, "round trip of {key}");
        assert!(cache.has(key).unwrap());
    }
}

#[test]
fn test_value_in_cache_cannot_be_changed() {
    let (cache, _) = single_node();
    let mut original = TestObject {
        test_field: "test_value".to_string(),
    };
    cache.set("test_object", &original, None).unwrap();

    let mut from_cache: TestObject = cache
        .get("test_object", TestObject { test_field: "default".to_string() })
        .unwrap();
    from_cache.test_field = "changed".to_string();
    original.test_field = "changed".to_string();

    let again: Option<TestObject> = cache.fetch("test_object").unwrap();
    assert_eq!(again.unwrap().test_field, "test_value");
}

#[test]
fn test_delete_and_has_and_get_non_existent() {
    let (cache, _) = single_node();

    assert!(!cache.has("non_existent_key").unwrap());
    assert_eq!(cache.get("non_existent_key", Value::Null).unwrap(), Value::Null);
    assert!(cache.delete("non_existent_key").unwrap());
}

#[test]
fn test_delete() {
    let (cache, _) = single_node();

    for (key, value) in data_provider() {
        cache.set(key, &value, None).unwrap();
        assert!(cache.delete(key).unwrap());
        assert_eq!(cache.get(key, Value::Null).unwrap(), Value::Null);
    }
}

#[test]
fn test_clear() {
    let (cache, store) = single_node();
    for (key, value) in data_provider() {
        cache.set(key, &value, None).unwrap();
    }

    assert!(cache.clear().unwrap());
    assert!(store.is_empty());
    for (key, _) in data_provider() {
        assert!(!cache.has(key).unwrap());
    }
}

#[test]
fn test_set_multiple_and_get_multiple() {
    for ttl in [None, Some(Ttl::Seconds(3600))] {
        let (cache, _) = single_node();
        let data = data_provider();

        assert!(cache.set_multiple(data.clone(), ttl.clone()).unwrap());
        // Overwriting succeeds too
        assert!(cache.set_multiple(data.clone(), ttl).unwrap());

        let keys: Vec<&str> = data.iter().map(|(key, _)| *key).collect();
        let values = cache.get_multiple(keys, json!("default")).unwrap();
        let expected: Vec<(String, Value)> = data
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        assert_eq!(values, expected);
    }
}

#[test]
fn test_set_multiple_failure_returns_false() {
    let (cache, store) = single_node();
    store.fail_expire_on("key");

    let result = cache.set_multiple([("key", "value")], Some(Ttl::Seconds(1_700_000_000)));
    assert!(!result.unwrap());
    // The MSET half of the transaction was still applied
    assert!(cache.has("key").unwrap());
}

#[test]
fn test_delete_multiple() {
    let (cache, _) = single_node();
    let data = data_provider();
    let keys: Vec<&str> = data.iter().map(|(key, _)| *key).collect();
    cache.set_multiple(data.clone(), None).unwrap();

    assert!(cache.delete_multiple(keys.clone()).unwrap());

    let values = cache.get_multiple(keys, Value::Null).unwrap();
    assert!(values.iter().all(|(_, value)| value.is_null()));
}

#[test]
fn test_zero_and_negative_ttl() {
    let (cache, _) = single_node();

    cache.set("a", &1, Some(Ttl::Seconds(-1))).unwrap();
    assert!(!cache.has("a").unwrap());

    cache.set("b", &2, Some(Ttl::Seconds(0))).unwrap();
    assert!(!cache.has("b").unwrap());

    cache.set_multiple([("a", 1), ("b", 2)], Some(Ttl::Seconds(-1))).unwrap();
    assert!(!cache.has("a").unwrap());
    assert!(!cache.has("b").unwrap());
}

#[test]
fn test_interval_ttl_sets_expiry() {
    let (cache, store) = single_node();
    let ttl = Ttl::from(RelativeInterval::new().hours(6).minutes(8));

    cache.set("interval", "v", Some(ttl)).unwrap();
    let remaining = store.ttl("interval").unwrap();
    assert!(remaining > 6 * 3600 && remaining <= 6 * 3600 + 8 * 60);
}

#[test]
fn test_invalid_keys_rejected() {
    let (cache, _) = single_node();

    for key in INVALID_KEYS {
        assert!(matches!(cache.get(key, Value::Null), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.set(key, &1, None), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.delete(key), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.has(key), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.get_multiple([key], Value::Null), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.set_multiple([(key, 1)], None), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.delete_multiple([key]), Err(CacheError::InvalidKey(_))));
    }
}

#[test]
fn test_invalid_key_rejected_before_store_is_touched() {
    let (cache, store) = single_node();
    store.set_unreachable(true);

    assert!(matches!(cache.get("a:b", 0), Err(CacheError::InvalidKey(_))));
    assert!(matches!(cache.get("ab", 0), Err(CacheError::Store(_))));
}

// == Cluster ==

#[test]
fn test_cluster_is_detected() {
    let (cache, _) = cluster();
    let topology = cache.topology();
    assert!(topology.is_cluster);
    assert_eq!(topology.nodes.len(), 3);
}

#[test]
fn test_cluster_clear_flushes_every_node() {
    let (cache, shards) = cluster();
    for (i, shard) in shards.iter().enumerate() {
        shard.set(&format!("shard_{i}"), b"1", None).unwrap();
    }

    assert!(cache.clear().unwrap());
    assert!(shards.iter().all(|shard| shard.is_empty()));
}

#[test]
fn test_cluster_clear_with_a_node_down_returns_false() {
    let (cache, shards) = cluster();
    for (i, shard) in shards.iter().enumerate() {
        shard.set(&format!("shard_{i}"), b"1", None).unwrap();
    }
    shards[2].set_unreachable(true);

    assert!(!cache.clear().unwrap());
    // The reachable shards were still flushed
    assert!(shards[0].is_empty());
    assert!(shards[1].is_empty());
    assert_eq!(shards[2].len(), 1);
}

#[test]
fn test_cluster_clear_with_every_node_down_is_an_error() {
    let shards: Vec<Arc<MemoryStore>> = (0..2).map(|_| Arc::new(MemoryStore::cluster_node())).collect();
    let nodes = vec![node(7001), node(7002)];
    let connector = MemoryConnector::new()
        .with_node(nodes[0].clone(), Arc::clone(&shards[0]))
        .with_node(nodes[1].clone(), Arc::clone(&shards[1]));
    let cache = CacheFacade::new(
        Arc::clone(&shards[0]),
        ClusterTopology::fixed(Topology::cluster(nodes), connector),
    );
    for shard in &shards {
        shard.set_unreachable(true);
    }

    assert!(matches!(cache.clear(), Err(CacheError::Store(_))));
}

#[test]
fn test_non_finite_floats_are_rejected() {
    let (cache, store) = single_node();

    for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        assert!(matches!(cache.set("float", &value, None), Err(CacheError::Codec(_))));
    }
    assert!(matches!(
        cache.set("nested", &json!({"ok": 1.5}), None),
        Ok(true)
    ));
    assert!(matches!(
        cache.set_multiple([("a", vec![1.0, f64::INFINITY])], None),
        Err(CacheError::Codec(_))
    ));
    assert!(!cache.has("float").unwrap());
    assert!(!cache.has("a").unwrap());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_cluster_batches_fall_back_to_single_key_commands() {
    let (cache, shards) = cluster();
    // A transactional EXPIRE on this key answers nil; SET with EX does not
    shards[0].fail_expire_on("a");

    assert!(cache.set_multiple([("a", 1), ("b", 2)], Some(Ttl::Seconds(60))).unwrap());
    let values = cache.get_multiple(["b", "a", "missing"], 0).unwrap();
    assert_eq!(
        values,
        vec![("b".to_string(), 2), ("a".to_string(), 1), ("missing".to_string(), 0)]
    );
    assert!(shards[0].ttl("a").unwrap() > 0);

    assert!(cache.set_multiple([("c", 3)], None).unwrap());
    assert!(cache.delete_multiple(["a", "b", "c", "missing"]).unwrap());
    assert!(shards[0].is_empty());
}

#[test]
fn test_unreachable_node_degrades_to_single_node() {
    let (cache, shards) = cluster();
    for shard in &shards[1..] {
        shard.set_unreachable(true);
    }
    shards[0].set_cluster_enabled(false);

    assert!(!cache.topology().is_cluster);
    // Single-node clear only touches the routing client
    assert!(cache.clear().unwrap());
}

#[test]
fn test_fixed_topology_is_injected() {
    let store = Arc::new(MemoryStore::new());
    let topology = ClusterTopology::fixed(
        Topology::cluster(vec![node(7000)]),
        MemoryConnector::new().with_node(node(7000), Arc::clone(&store)),
    );
    let cache = CacheFacade::new(Arc::clone(&store), topology);

    // The store itself does not report cluster mode
    assert!(cache.topology().is_cluster);
    cache.set("k", &1, None).unwrap();
    assert!(cache.clear().unwrap());
    assert!(store.is_empty());
}

// == Live Redis ==

fn live_nodes() -> Vec<NodeDescriptor> {
    std::env::var("REDIS_NODES")
        .unwrap_or_else(|_| "127.0.0.1:6379".to_string())
        .split(',')
        .map(|entry| entry.parse().unwrap())
        .collect()
}

#[test]
#[ignore]
fn test_live_redis_round_trip() {
    let nodes = live_nodes();
    let client = RedisStore::open(&nodes[0]).unwrap();
    let cache = CacheFacade::new(client, ClusterTopology::new(nodes, RedisConnector));

    for (key, value) in data_provider() {
        assert!(cache.set(key, &value, Some(Ttl::Seconds(60))).unwrap());
        assert_eq!(cache.get(key, json!("default")).unwrap(), value);
    }
    assert!(cache.set_multiple(data_provider(), Some(Ttl::Seconds(60))).unwrap());
    assert!(cache.delete_multiple(data_provider().into_iter().map(|(key, _)| key)).unwrap());
    assert!(cache.clear().unwrap());
}
