//! Background Tasks Module
//!
//! Contains background tasks that run periodically during gateway operation.
//!
//! # Tasks
//! - Expiry Purge: Drops expired entries from the in-process store

mod purge;

pub use purge::spawn_purge_task;
