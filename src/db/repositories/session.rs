//! Session repository
//!
//! Database operations for bearer sessions.
//!
//! This module provides:
//! - `SessionRepository` trait, the persistence contract the auth service consumes
//! - `SqlxSessionRepository` implementing the trait for SQLite and MySQL
//!
//! Expiry is evaluated by the caller at read time. `purge_expired` only
//! reclaims space and is not part of the service-facing contract.

use crate::config::DatabaseDriver;
use crate::context::RequestContext;
use crate::db::pool::{mysql_pool, sqlite_pool};
use crate::db::{DynDatabasePool, StoreError, StoreResult};
use crate::models::SessionLookup;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new session for `user_id`
    async fn create(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Look up a session joined with its owning user. `None` is a normal outcome.
    async fn find_by_token(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> StoreResult<Option<SessionLookup>>;
}

/// SQLx-based session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }

    /// Delete sessions whose expiry is at or before `now`.
    ///
    /// Returns the number of deleted rows.
    pub async fn purge_expired(&self, ctx: &RequestContext, now: DateTime<Utc>) -> StoreResult<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                ctx.run("purge_expired_sessions", purge_expired_sqlite(pool, now))
                    .await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                ctx.run("purge_expired_sessions", purge_expired_mysql(pool, now))
                    .await
            }
        }
    }

    /// Purge expired sessions every `interval` until `cancel` fires.
    ///
    /// Each pass is bounded by the interval itself.
    pub async fn run_purge_loop(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let ctx = RequestContext::child_of(&cancel).with_timeout(interval);
                    match self.purge_expired(&ctx, Utc::now()).await {
                        Ok(0) => {}
                        Ok(deleted) => tracing::info!(deleted, "Purged expired sessions"),
                        Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
                    }
                }
            }
        }
        tracing::debug!("Session purge task stopped");
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                ctx.run(
                    "create_session",
                    create_session_sqlite(pool, user_id, token, expires_at),
                )
                .await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                ctx.run(
                    "create_session",
                    create_session_mysql(pool, user_id, token, expires_at),
                )
                .await
            }
        }
    }

    async fn find_by_token(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> StoreResult<Option<SessionLookup>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                ctx.run("find_session_by_token", find_by_token_sqlite(pool, token))
                    .await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                ctx.run("find_session_by_token", find_by_token_mysql(pool, token))
                    .await
            }
        }
    }
}

const FIND_BY_TOKEN_SQL: &str = r#"
    SELECT s.user_id, u.username, u.email, s.expires_at
    FROM sessions s
    INNER JOIN users u ON u.id = s.user_id
    WHERE s.token = ?
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (user_id, token, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| StoreError::from_sqlx(e, "Failed to create session"))?;
    Ok(())
}

async fn find_by_token_sqlite(pool: &SqlitePool, token: &str) -> StoreResult<Option<SessionLookup>> {
    let row = sqlx::query(FIND_BY_TOKEN_SQL)
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "Failed to get session by token"))?;

    match row {
        Some(row) => {
            let decode = |e| StoreError::from_sqlx(e, "Failed to decode session row");
            Ok(Some(SessionLookup {
                user_id: row.try_get("user_id").map_err(decode)?,
                username: row.try_get("username").map_err(decode)?,
                email: row.try_get("email").map_err(decode)?,
                expires_at: row.try_get("expires_at").map_err(decode)?,
            }))
        }
        None => Ok(None),
    }
}

async fn purge_expired_sqlite(pool: &SqlitePool, now: DateTime<Utc>) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "Failed to delete expired sessions"))?;
    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(
    pool: &MySqlPool,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (user_id, token, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| StoreError::from_sqlx(e, "Failed to create session"))?;
    Ok(())
}

async fn find_by_token_mysql(pool: &MySqlPool, token: &str) -> StoreResult<Option<SessionLookup>> {
    let row = sqlx::query(FIND_BY_TOKEN_SQL)
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "Failed to get session by token"))?;

    match row {
        Some(row) => {
            let decode = |e| StoreError::from_sqlx(e, "Failed to decode session row");
            Ok(Some(SessionLookup {
                user_id: row.try_get("user_id").map_err(decode)?,
                username: row.try_get("username").map_err(decode)?,
                email: row.try_get("email").map_err(decode)?,
                expires_at: row.try_get("expires_at").map_err(decode)?,
            }))
        }
        None => Ok(None),
    }
}

async fn purge_expired_mysql(pool: &MySqlPool, now: DateTime<Utc>) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "Failed to delete expired sessions"))?;
    Ok(result.rows_affected())
}
