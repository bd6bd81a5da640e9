//! API layer - HTTP handlers and routing
//!
//! This module contains the HTTP surface of the auth service:
//! - Auth API endpoints under `/api/v1/auth`
//! - Liveness (`/health`) and readiness (`/ready`) probes
//! - Prometheus metrics (`/metrics`)

pub mod auth;
pub mod metrics;
pub mod middleware;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::context::RequestContext;
use crate::db::DynDatabasePool;
use crate::services::AuthService;

pub use metrics::Metrics;
pub use middleware::{ApiError, TraceId};

/// Shared state of all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    /// Pinged by `/ready`
    pub db: DynDatabasePool,
    pub metrics: Arc<Metrics>,
    /// Deadline applied to the store calls of each request
    pub operation_timeout: Duration,
    /// Set once shutdown begins; `/ready` answers 503 afterwards
    pub shutting_down: Arc<AtomicBool>,
    /// Cancelled when in-flight requests must stop
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        auth_service: Arc<AuthService>,
        db: DynDatabasePool,
        metrics: Arc<Metrics>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            auth_service,
            db,
            metrics,
            operation_timeout,
            shutting_down: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Context for one request: configured timeout, cancelled with the server
    pub fn request_context(&self, trace_id: Option<&TraceId>) -> RequestContext {
        let ctx = RequestContext::child_of(&self.shutdown).with_timeout(self.operation_timeout);
        match trace_id {
            Some(trace_id) => ctx.with_trace_id(trace_id.as_str()),
            None => ctx,
        }
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

/// Build the versioned API router
pub fn build_api_router() -> Router<AppState> {
    Router::new().nest("/auth", auth::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let trace_id = request
            .extensions()
            .get::<TraceId>()
            .map(TraceId::as_str)
            .unwrap_or_default();
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            trace_id = %trace_id,
        )
    });

    let track_metrics =
        axum_middleware::from_fn_with_state(state.metrics.clone(), metrics::track_metrics);

    Router::new()
        .nest("/api/v1", build_api_router())
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(track_metrics)
        .layer(trace_layer)
        // Outermost, so the trace span sees the id
        .layer(axum_middleware::from_fn(middleware::trace_id_middleware))
        .with_state(state)
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /ready
///
/// 503 once shutdown began or while the database does not answer a ping
/// within the operation timeout.
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_shutting_down() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "shutting_down" })),
        );
    }

    match tokio::time::timeout(state.operation_timeout, state.db.ping()).await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "database_unavailable" })),
            )
        }
        Err(_) => {
            tracing::warn!("Readiness check timed out");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "database_unavailable" })),
            )
        }
    }
}
