//! API Routes
//!
//! Configures the Axum router with all gateway endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    batch_delete_handler, batch_get_handler, batch_set_handler, clear_handler, delete_handler,
    exists_handler, get_handler, health_handler, set_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /cache/:key` - Retrieve a value
/// - `PUT /cache/:key` - Store a value with optional TTL
/// - `DELETE /cache/:key` - Delete a key
/// - `GET /cache/:key/exists` - Check whether a key exists
/// - `DELETE /cache` - Clear the keyspace
/// - `POST /batch/get` - Retrieve several keys
/// - `PUT /batch` - Store several values with one TTL
/// - `POST /batch/delete` - Delete several keys
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router with all endpoints
    Router::new()
        .route("/cache", delete(clear_handler))
        .route(
            "/cache/:key",
            get(get_handler).put(set_handler).delete(delete_handler),
        )
        .route("/cache/:key/exists", get(exists_handler))
        .route("/batch", put(batch_set_handler))
        .route("/batch/get", post(batch_get_handler))
        .route("/batch/delete", post(batch_delete_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
