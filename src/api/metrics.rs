//! Prometheus metrics
//!
//! Every request is counted by method, matched route and status, and its
//! latency recorded in a histogram. `GET /metrics` renders the registry in the
//! Prometheus text format.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::api::middleware::ApiError;
use crate::api::AppState;

/// Route label for requests that matched no route
const UNMATCHED_ROUTE: &str = "unmatched";

/// Request metrics and the registry they live in
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
            &["method", "path"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
        })
    }

    /// Record one finished request
    pub fn observe(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        self.requests_total
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.request_duration
            .with_label_values(&[method, path])
            .observe(elapsed.as_secs_f64());
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Count and time every request
pub async fn track_metrics(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    metrics.observe(&method, &path, response.status().as_u16(), started.elapsed());
    response
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.metrics.render().map_err(|e| {
        tracing::error!(error = %e, "Failed to encode metrics");
        ApiError::internal_error("Internal server error")
    })?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_and_render() {
        let metrics = Metrics::new().unwrap();
        metrics.observe("GET", "/health", 200, Duration::from_millis(3));
        metrics.observe("GET", "/health", 200, Duration::from_millis(5));
        metrics.observe("POST", "/api/v1/auth/login", 401, Duration::from_millis(40));

        let text = metrics.render().unwrap();
        assert!(text.contains("# TYPE http_requests_total counter"));
        assert!(text.contains("# TYPE http_request_duration_seconds histogram"));
        assert!(text.contains("path=\"/health\""));
        assert!(text.contains("status=\"401\""));
        assert!(text.contains("http_request_duration_seconds_bucket"));
    }

    #[test]
    fn test_fresh_registry_renders_without_samples() {
        let metrics = Metrics::new().unwrap();
        let text = metrics.render().unwrap();
        assert!(!text.contains("http_requests_total{"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.observe("GET", "/ready", 200, Duration::from_millis(1));

        assert!(first.render().unwrap().contains("path=\"/ready\""));
        assert!(!second.render().unwrap().contains("path=\"/ready\""));
    }
}
