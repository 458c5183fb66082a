//! API Handlers
//!
//! HTTP request handlers for each gateway endpoint. The facade is blocking,
//! so every call runs on the blocking thread pool.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::cache::{CacheFacade, ClusterTopology};
use crate::config::{Backend, Config};
use crate::error::{CacheError, Result};
use crate::models::{
    BatchDeleteRequest, BatchGetRequest, BatchGetResponse, BatchSetRequest, ExistsResponse,
    GetResponse, HealthResponse, SetRequest, StatusResponse, WriteResponse,
};
use crate::store::{MemoryConnector, MemoryStore, RedisConnector, RedisStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache facade
    pub cache: Arc<CacheFacade>,
    /// In-process store when the memory backend is active
    pub memory: Option<Arc<MemoryStore>>,
}

impl AppState {
    /// Creates a new AppState around an existing facade.
    pub fn new(cache: CacheFacade) -> Self {
        Self {
            cache: Arc::new(cache),
            memory: None,
        }
    }

    /// Creates a facade over a fresh in-process store answering for `config`'s nodes.
    pub fn in_memory(config: &Config) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let nodes = config.nodes()?;
        let connector = nodes.iter().fold(MemoryConnector::new(), |connector, node| {
            connector.with_node(node.clone(), Arc::clone(&store))
        });
        let cache = CacheFacade::new(Arc::clone(&store), ClusterTopology::new(nodes, connector));

        Ok(Self {
            cache: Arc::new(cache),
            memory: Some(store),
        })
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.backend == Backend::Memory {
            info!("Using in-process memory backend");
            return Self::in_memory(config);
        }

        let nodes = config.nodes()?;
        let client = if config.redis_cluster {
            RedisStore::open_cluster(&nodes)?
        } else {
            RedisStore::open(&nodes[0])?
        };
        info!(store = ?client, nodes = nodes.len(), "Using Redis backend");

        let topology = ClusterTopology::new(nodes, RedisConnector);
        Ok(Self::new(CacheFacade::new(client, topology)))
    }
}

/// Runs a facade call on the blocking pool.
async fn with_cache<T, F>(state: &AppState, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CacheFacade) -> Result<T> + Send + 'static,
{
    let cache = Arc::clone(&state.cache);
    tokio::task::spawn_blocking(move || call(&cache))
        .await
        .map_err(|err| CacheError::Internal(err.to_string()))?
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let lookup = key.clone();
    let value: Option<Value> = with_cache(&state, move |cache| cache.fetch(&lookup)).await?;

    match value {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for PUT /cache/:key
///
/// Stores a value with an optional TTL. An expired TTL deletes the key.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<WriteResponse>> {
    let target = key.clone();
    let success = with_cache(&state, move |cache| cache.set(&target, &req.value, req.ttl)).await?;

    Ok(Json(WriteResponse::new(key, success)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<WriteResponse>> {
    let target = key.clone();
    let success = with_cache(&state, move |cache| cache.delete(&target)).await?;

    Ok(Json(WriteResponse::new(key, success)))
}

/// Handler for GET /cache/:key/exists
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ExistsResponse>> {
    let target = key.clone();
    let exists = with_cache(&state, move |cache| cache.has(&target)).await?;

    Ok(Json(ExistsResponse::new(key, exists)))
}

/// Handler for DELETE /cache
///
/// Flushes the whole keyspace, every node when clustered.
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    let success = with_cache(&state, |cache| cache.clear()).await?;
    Ok(Json(StatusResponse::new(success)))
}

/// Handler for POST /batch/get
pub async fn batch_get_handler(
    State(state): State<AppState>,
    Json(req): Json<BatchGetRequest>,
) -> Result<Json<BatchGetResponse>> {
    let values = with_cache(&state, move |cache| cache.get_multiple(req.keys, req.default)).await?;
    Ok(Json(BatchGetResponse::new(values)))
}

/// Handler for PUT /batch
pub async fn batch_set_handler(
    State(state): State<AppState>,
    Json(req): Json<BatchSetRequest>,
) -> Result<Json<StatusResponse>> {
    let success = with_cache(&state, move |cache| {
        let pairs = req.values.into_iter().map(|entry| (entry.key, entry.value));
        cache.set_multiple(pairs, req.ttl)
    })
    .await?;

    Ok(Json(StatusResponse::new(success)))
}

/// Handler for POST /batch/delete
pub async fn batch_delete_handler(
    State(state): State<AppState>,
    Json(req): Json<BatchDeleteRequest>,
) -> Result<Json<StatusResponse>> {
    let success = with_cache(&state, move |cache| cache.delete_multiple(req.keys)).await?;
    Ok(Json(StatusResponse::new(success)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
