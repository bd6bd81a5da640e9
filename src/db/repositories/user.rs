//! User repository
//!
//! Database operations for identity records.
//!
//! This module provides:
//! - `UserRepository` trait, the persistence contract the auth service consumes
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! Every call runs under the caller's `RequestContext`, so it gives up as soon
//! as the caller's deadline passes or its context is cancelled.

use crate::config::DatabaseDriver;
use crate::context::RequestContext;
use crate::db::pool::{mysql_pool, sqlite_pool};
use crate::db::{DynDatabasePool, StoreError, StoreResult};
use crate::models::User;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by username. `None` is a normal outcome.
    async fn find_by_username(
        &self,
        ctx: &RequestContext,
        username: &str,
    ) -> StoreResult<Option<User>>;

    /// Whether any user already holds `username` or `email`
    async fn exists_by_username_or_email(
        &self,
        ctx: &RequestContext,
        username: &str,
        email: &str,
    ) -> StoreResult<bool>;

    /// Insert a new user and return its identifier.
    ///
    /// Fails with `StoreError::UniqueViolation` when the username or email
    /// was taken concurrently.
    async fn create(
        &self,
        ctx: &RequestContext,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<i64>;

    /// Stamp the user's last successful login with the current time
    async fn update_last_login(&self, ctx: &RequestContext, user_id: i64) -> StoreResult<()>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn find_by_username(
        &self,
        ctx: &RequestContext,
        username: &str,
    ) -> StoreResult<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                ctx.run("find_by_username", find_by_username_sqlite(pool, username))
                    .await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                ctx.run("find_by_username", find_by_username_mysql(pool, username))
                    .await
            }
        }
    }

    async fn exists_by_username_or_email(
        &self,
        ctx: &RequestContext,
        username: &str,
        email: &str,
    ) -> StoreResult<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                ctx.run(
                    "exists_by_username_or_email",
                    exists_by_username_or_email_sqlite(pool, username, email),
                )
                .await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                ctx.run(
                    "exists_by_username_or_email",
                    exists_by_username_or_email_mysql(pool, username, email),
                )
                .await
            }
        }
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                ctx.run(
                    "create_user",
                    create_user_sqlite(pool, username, email, password_hash),
                )
                .await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                ctx.run(
                    "create_user",
                    create_user_mysql(pool, username, email, password_hash),
                )
                .await
            }
        }
    }

    async fn update_last_login(&self, ctx: &RequestContext, user_id: i64) -> StoreResult<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                ctx.run("update_last_login", update_last_login_sqlite(pool, user_id))
                    .await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                ctx.run("update_last_login", update_last_login_mysql(pool, user_id))
                    .await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn find_by_username_sqlite(pool: &SqlitePool, username: &str) -> StoreResult<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, username, email, password_hash, created_at, last_login
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(|e| StoreError::from_sqlx(e, "Failed to get user by username"))?;

    match row {
        Some(row) => Ok(Some(row_to_user_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn exists_by_username_or_email_sqlite(
    pool: &SqlitePool,
    username: &str,
    email: &str,
) -> StoreResult<bool> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE username = ? OR email = ?")
        .bind(username)
        .bind(email)
        .fetch_one(pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "Failed to check user existence"))?;

    let count: i64 = row
        .try_get("count")
        .map_err(|e| StoreError::from_sqlx(e, "Failed to decode user count"))?;
    Ok(count > 0)
}

async fn create_user_sqlite(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> StoreResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| StoreError::from_sqlx(e, "Failed to create user"))?;

    Ok(result.last_insert_rowid())
}

async fn update_last_login_sqlite(pool: &SqlitePool, user_id: i64) -> StoreResult<()> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "Failed to update last login"))?;
    Ok(())
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> StoreResult<User> {
    let decode = |e| StoreError::from_sqlx(e, "Failed to decode user row");
    Ok(User {
        id: row.try_get("id").map_err(decode)?,
        username: row.try_get("username").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        password_hash: row.try_get("password_hash").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        last_login: row.try_get("last_login").map_err(decode)?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn find_by_username_mysql(pool: &MySqlPool, username: &str) -> StoreResult<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, username, email, password_hash, created_at, last_login
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(|e| StoreError::from_sqlx(e, "Failed to get user by username"))?;

    match row {
        Some(row) => Ok(Some(row_to_user_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn exists_by_username_or_email_mysql(
    pool: &MySqlPool,
    username: &str,
    email: &str,
) -> StoreResult<bool> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE username = ? OR email = ?")
        .bind(username)
        .bind(email)
        .fetch_one(pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "Failed to check user existence"))?;

    let count: i64 = row
        .try_get("count")
        .map_err(|e| StoreError::from_sqlx(e, "Failed to decode user count"))?;
    Ok(count > 0)
}

async fn create_user_mysql(
    pool: &MySqlPool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> StoreResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| StoreError::from_sqlx(e, "Failed to create user"))?;

    Ok(result.last_insert_id() as i64)
}

async fn update_last_login_mysql(pool: &MySqlPool, user_id: i64) -> StoreResult<()> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "Failed to update last login"))?;
    Ok(())
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> StoreResult<User> {
    let decode = |e| StoreError::from_sqlx(e, "Failed to decode user row");
    Ok(User {
        id: row.try_get("id").map_err(decode)?,
        username: row.try_get("username").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        password_hash: row.try_get("password_hash").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        last_login: row.try_get("last_login").map_err(decode)?,
    })
}
