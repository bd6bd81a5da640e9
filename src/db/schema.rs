//! Schema bootstrap
//!
//! Creates the `users` and `sessions` tables when they are missing. Every
//! statement is idempotent, so this runs on each startup.
//!
//! ```ignore
//! use auth_service::db::{create_pool, schema};
//!
//! let pool = create_pool(&config.database).await?;
//! schema::ensure_schema(&pool).await?;
//! ```

use anyhow::{Context, Result};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username VARCHAR(255) NOT NULL UNIQUE,
        email VARCHAR(255) NOT NULL UNIQUE,
        password_hash VARCHAR(255) NOT NULL,
        created_at TIMESTAMP NOT NULL,
        last_login TIMESTAMP NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        token VARCHAR(255) NOT NULL UNIQUE,
        expires_at TIMESTAMP NOT NULL,
        created_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at)",
];

// MySQL has no CREATE INDEX IF NOT EXISTS, so indexes live in the table DDL
const MYSQL_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        username VARCHAR(255) NOT NULL UNIQUE,
        email VARCHAR(255) NOT NULL UNIQUE,
        password_hash VARCHAR(255) NOT NULL,
        created_at DATETIME(6) NOT NULL,
        last_login DATETIME(6) NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        user_id BIGINT NOT NULL,
        token VARCHAR(255) NOT NULL UNIQUE,
        expires_at DATETIME(6) NOT NULL,
        created_at DATETIME(6) NOT NULL,
        INDEX idx_sessions_user_id (user_id),
        INDEX idx_sessions_expires_at (expires_at),
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
];

/// Create missing tables and indexes for the pool's driver.
pub async fn ensure_schema(pool: &DynDatabasePool) -> Result<()> {
    let statements = match pool.driver() {
        DatabaseDriver::Sqlite => SQLITE_SCHEMA,
        DatabaseDriver::Mysql => MYSQL_SCHEMA,
    };

    for statement in statements {
        pool.execute(statement)
            .await
            .context("Failed to apply schema statement")?;
    }

    tracing::debug!(driver = ?pool.driver(), "Schema is up to date");
    Ok(())
}
