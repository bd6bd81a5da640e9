//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/v1/auth/register - User registration
//! - POST /api/v1/auth/login - User login
//! - GET /api/v1/auth/me - Current user from a bearer token

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{extract_bearer_token, ApiError, TraceId};
use crate::api::AppState;
use crate::models::{AuthResponse, LoginInput, PublicUser, RegisterInput};

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    fn validate(self) -> Result<LoginInput, ApiError> {
        if self.username.is_empty() {
            return Err(ApiError::validation_error("Username is required"));
        }
        if self.password.is_empty() {
            return Err(ApiError::validation_error("Password is required"));
        }
        Ok(LoginInput {
            username: self.username,
            password: self.password,
        })
    }
}

/// Request body for user registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterRequest {
    fn validate(self) -> Result<RegisterInput, ApiError> {
        if self.username.is_empty() {
            return Err(ApiError::validation_error("Username is required"));
        }
        if self.email.is_empty() || !self.email.contains('@') {
            return Err(ApiError::validation_error("A valid email is required"));
        }
        if self.password.is_empty() {
            return Err(ApiError::validation_error("Password is required"));
        }
        Ok(RegisterInput {
            username: self.username,
            email: self.email,
            password: self.password,
        })
    }
}

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::validation_error(rejection.body_text()))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    trace_id: Option<Extension<TraceId>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let input = parse_body(body)?.validate()?;
    let ctx = state.request_context(trace_id.as_deref());

    let response = state.auth_service.login(&ctx, input).await?;
    tracing::info!(user_id = response.user.id, "Login successful");
    Ok(Json(response))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    trace_id: Option<Extension<TraceId>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = parse_body(body)?.validate()?;
    let ctx = state.request_context(trace_id.as_deref());

    let response = state.auth_service.register(&ctx, input).await?;
    tracing::info!(user_id = response.user.id, "Registration successful");
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/auth/me
async fn me(
    State(state): State<AppState>,
    trace_id: Option<Extension<TraceId>>,
    headers: HeaderMap,
) -> Result<Json<PublicUser>, ApiError> {
    let token = extract_bearer_token(&headers)?;
    let ctx = state.request_context(trace_id.as_deref());

    let user = state.auth_service.resolve_by_token(&ctx, token).await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_validation() {
        let ok = LoginRequest {
            username: "alice".to_string(),
            password: "pw".to_string(),
        };
        assert!(ok.validate().is_ok());

        let missing = LoginRequest {
            username: String::new(),
            password: "pw".to_string(),
        };
        assert_eq!(missing.validate().unwrap_err().error.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_register_request_requires_email_with_at() {
        let bad = RegisterRequest {
            username: "alice".to_string(),
            email: "alice.example.com".to_string(),
            password: "pw".to_string(),
        };
        let err = bad.validate().unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
        assert_eq!(err.error.message, "A valid email is required");
    }
}
