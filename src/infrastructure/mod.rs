//! Infrastructure layer - Framework implementations
//!
//! This layer contains:
//! - Database connection, schema and readiness polling (db)
//! - HTTP server setup (server)
//! - Configuration loading (config)
//! - Password hashing and token extraction (auth)
//! - Response caching (cache)
//! - Search and ordering helpers for list queries (query)
//! - Repository implementations (repositories)
//! - Demo data and superuser bootstrap (seed)
//! - Application state (state)

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod query;
pub mod repositories;
pub mod seed;
pub mod server;
pub mod state;

pub use repositories::*;
pub use state::AppState;
