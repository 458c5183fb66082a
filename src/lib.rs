//! Redis Facade - A caching facade over Redis
//!
//! Provides get/set/delete/batch operations with TTL normalization, key
//! validation and cluster-aware batching, plus an HTTP gateway exposing them.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheFacade, ClusterTopology, NodeDescriptor, RelativeInterval, Topology, Ttl};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_purge_task;
