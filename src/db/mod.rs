//! Database layer
//!
//! This module provides the persistence collaborator of the auth service.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration.
//!
//! # Architecture
//!
//! The database layer uses a trait-based abstraction (`DatabasePool`) that
//! allows the repositories to work with either SQLite or MySQL without the
//! service knowing the specific backend. The pool is created and closed by
//! process wiring; the service only sees the repository traits.
//!
//! # Usage
//!
//! ```ignore
//! use auth_service::config::DatabaseConfig;
//! use auth_service::db::{create_pool, schema};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! schema::ensure_schema(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod error;
pub mod pool;
pub mod repositories;
pub mod schema;

pub use error::{StoreError, StoreResult};
pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
