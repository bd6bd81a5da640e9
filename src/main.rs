//! auth-service - credential verification and bearer sessions over HTTP

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth_service::{
    api::{self, AppState, Metrics},
    config::Config,
    db::{
        self,
        repositories::{SqlxSessionRepository, SqlxUserRepository},
        schema,
    },
    services::{Argon2Hasher, AuthService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so the log level can come from it
    let config = Config::load_with_env(Path::new("config.yml"))?;

    // Initialize tracing
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("auth_service={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting auth service...");
    config.validate().context("Invalid configuration")?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    schema::ensure_schema(&pool).await?;
    tracing::info!("Database schema ready");

    // Wire stores, hasher and service
    let hasher = Argon2Hasher::new(&config.auth.hashing).context("Invalid hashing parameters")?;
    let session_repo = Arc::new(SqlxSessionRepository::new(pool.clone()));
    let auth_service = AuthService::new(
        SqlxUserRepository::boxed(pool.clone()),
        session_repo.clone(),
        Arc::new(hasher),
    )
    .with_session_lifetime(config.auth.session_lifetime())
    .with_token_format(config.auth.token_format);

    let metrics = Metrics::new().context("Failed to register metrics")?;
    let state = AppState::new(
        Arc::new(auth_service),
        pool.clone(),
        Arc::new(metrics),
        config.auth.operation_timeout(),
    );

    // Expired session purge task
    let purge_handle = config.auth.session_purge_interval().map(|interval| {
        tracing::info!(?interval, "Session purge task started");
        let repo = session_repo.clone();
        let cancel = state.shutdown.clone();
        tokio::spawn(async move { repo.run_purge_loop(interval, cancel).await })
    });

    // Build router
    let app = api::build_router(state.clone());

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    let stop_accepting = CancellationToken::new();
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let stop_accepting = stop_accepting.clone();
        async move { stop_accepting.cancelled().await }
    });
    let mut server_task = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server_task => {
            // The server only returns on its own when it failed
            result.context("Server task panicked")?.context("Server error")?;
            pool.close().await;
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    // Readiness first, so load balancers stop routing before we stop accepting
    state.begin_shutdown();
    let drain_delay = config.shutdown.readiness_drain_delay();
    if !drain_delay.is_zero() {
        tracing::info!(?drain_delay, "Readiness drain delay started");
        tokio::time::sleep(drain_delay).await;
    }

    let timeout = config.shutdown.timeout();
    tracing::info!(?timeout, "Shutting down server...");
    stop_accepting.cancel();

    match tokio::time::timeout(timeout, &mut server_task).await {
        Ok(Ok(Ok(()))) => tracing::info!("HTTP server shutdown complete"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server shutdown error"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server task failed"),
        Err(_) => {
            tracing::warn!("Shutdown timeout elapsed, cancelling in-flight requests");
            state.shutdown.cancel();
            server_task.abort();
        }
    }

    // Stops the purge task and anything still holding a request context
    state.shutdown.cancel();
    if let Some(handle) = purge_handle {
        let _ = tokio::time::timeout(timeout, handle).await;
    }

    pool.close().await;
    tracing::info!("Database connection closed");
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
