//! API middleware
//!
//! Contains:
//! - `ApiError`, the JSON error body and its status mapping
//! - The service error to HTTP mapping
//! - Bearer token extraction
//! - Trace id propagation

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::AuthServiceError;

/// Response header carrying the request's trace id
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// W3C trace context header
pub const TRACE_PARENT_HEADER: &str = "traceparent";

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Map service errors to HTTP responses.
///
/// `UserNotFound` and `InvalidCredentials` must produce byte-identical
/// responses so a client cannot probe which usernames exist. Infrastructure
/// failures never expose their cause.
impl From<AuthServiceError> for ApiError {
    fn from(err: AuthServiceError) -> Self {
        if err.is_caller_error() {
            tracing::info!(error = %err, "Request rejected");
        } else {
            tracing::error!(error = %err, "Request failed");
        }

        match err {
            AuthServiceError::UserNotFound | AuthServiceError::InvalidCredentials => {
                ApiError::unauthorized("Invalid credentials")
            }
            AuthServiceError::UserAlreadyExists => {
                ApiError::conflict("Username or email already exists")
            }
            AuthServiceError::SessionNotFound | AuthServiceError::SessionExpired => {
                ApiError::unauthorized("Invalid or expired token")
            }
            AuthServiceError::PasswordExpired => ApiError::forbidden("Password expired"),
            AuthServiceError::AccountLocked => ApiError::forbidden("Account locked"),
            AuthServiceError::Unauthorized => ApiError::forbidden("Access denied"),
            AuthServiceError::HashingFailed(_) | AuthServiceError::PersistenceFailure(_) => {
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// Everything after the `Bearer ` prefix is the token, byte for byte.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Authorization header required"))?;

    value
        .to_str()
        .ok()
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization format"))
}

/// Trace id of the current request, stored as a request extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    /// Take the trace id from `traceparent`, then `X-Trace-ID`, else generate one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let from_traceparent = headers
            .get(TRACE_PARENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split('-').filter(|part| !part.is_empty()).nth(1))
            .map(str::to_string);

        let from_header = || {
            headers
                .get(TRACE_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        TraceId(
            from_traceparent
                .or_else(from_header)
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Attach a trace id to the request and echo it in the response
pub async fn trace_id_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = TraceId::from_headers(request.headers());
    request.extensions_mut().insert(trace_id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}
