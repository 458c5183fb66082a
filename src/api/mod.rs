//! API Module
//!
//! HTTP handlers and routing exposing the cache facade as a JSON API.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
