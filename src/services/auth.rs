//! Authentication service
//!
//! Implements the authentication core on top of the two store traits and the
//! credential hasher:
//! - Login: verify credentials, stamp last login, issue a session
//! - Register: hash, check uniqueness, insert, issue a session
//! - Resolve: map a bearer token to the public view of its user
//!
//! The service holds no state between calls. Every store call receives the
//! caller's `RequestContext` unchanged, including the best-effort ones.
//!
//! # Error contract
//!
//! `UserNotFound` and `InvalidCredentials` stay distinct here so logs can tell
//! them apart. The transport layer must render both identically so a client
//! cannot learn whether an account exists.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::config::TokenFormat;
use crate::context::RequestContext;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::db::{StoreError, StoreResult};
use crate::models::{AuthResponse, LoginInput, PublicUser, RegisterInput};
use crate::services::password::{CredentialHasher, HashError};
use crate::services::token::generate_session_token;

/// Default session lifetime in hours
const DEFAULT_SESSION_LIFETIME_HOURS: i64 = 24;

/// Error kinds returned by the authentication service
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// No user with the given username
    #[error("User not found")]
    UserNotFound,

    /// Password mismatch or unverifiable digest
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Reserved, never produced
    #[error("Password expired")]
    PasswordExpired,

    /// Reserved, never produced
    #[error("Account locked")]
    AccountLocked,

    /// Reserved, never produced
    #[error("Unauthorized")]
    Unauthorized,

    /// Username or email already taken
    #[error("User already exists")]
    UserAlreadyExists,

    /// Token was never issued or its session was not stored
    #[error("Session not found")]
    SessionNotFound,

    /// Session exists but its expiry has passed
    #[error("Session expired")]
    SessionExpired,

    #[error("Password hashing failed: {0}")]
    HashingFailed(#[from] HashError),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),
}

impl AuthServiceError {
    /// Problems with what the caller sent: bad credentials, duplicate
    /// identity, unknown or expired session, and the reserved account states.
    pub fn is_caller_error(&self) -> bool {
        !self.is_infrastructure()
    }

    /// Hashing and persistence failures
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AuthServiceError::HashingFailed(_) | AuthServiceError::PersistenceFailure(_)
        )
    }
}

/// Outcome of a side effect whose failure is logged but never fails the
/// enclosing login or registration.
#[derive(Debug)]
#[must_use]
pub enum BestEffort {
    Done,
    Failed(StoreError),
}

impl BestEffort {
    fn observe(operation: &'static str, user_id: i64, result: StoreResult<()>) -> Self {
        match result {
            Ok(()) => BestEffort::Done,
            Err(e) => {
                warn!(operation, user_id, error = %e, "Best-effort operation failed");
                BestEffort::Failed(e)
            }
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, BestEffort::Done)
    }
}

/// Authentication service
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    hasher: Arc<dyn CredentialHasher>,
    session_lifetime: Duration,
    token_format: TokenFormat,
}

impl AuthService {
    /// Create a new auth service with a 24 hour session lifetime and opaque tokens
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            hasher,
            session_lifetime: Duration::hours(DEFAULT_SESSION_LIFETIME_HOURS),
            token_format: TokenFormat::default(),
        }
    }

    pub fn with_session_lifetime(mut self, session_lifetime: Duration) -> Self {
        self.session_lifetime = session_lifetime;
        self
    }

    pub fn with_token_format(mut self, token_format: TokenFormat) -> Self {
        self.token_format = token_format;
        self
    }

    /// Log a user in.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if no user has this username
    /// - `InvalidCredentials` on password mismatch or an unverifiable digest
    /// - `PersistenceFailure` if the user lookup fails or the session lifetime
    ///   overflows the expiry date
    ///
    /// Failing to stamp the last login or to store the session does not fail
    /// the login; see [`AuthResponse::session_persisted`].
    #[tracing::instrument(skip_all, fields(username = %input.username, trace_id = ctx.trace_id().unwrap_or_default()))]
    pub async fn login(
        &self,
        ctx: &RequestContext,
        input: LoginInput,
    ) -> Result<AuthResponse, AuthServiceError> {
        let user = self
            .user_repo
            .find_by_username(ctx, &input.username)
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;

        let matches = match self
            .verify_password(user.password_hash.clone(), input.password)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "Password verification failed");
                false
            }
        };
        if !matches {
            debug!(user_id = user.id, "Password mismatch");
            return Err(AuthServiceError::InvalidCredentials);
        }

        let last_login = BestEffort::observe(
            "update_last_login",
            user.id,
            self.user_repo.update_last_login(ctx, user.id).await,
        );

        let (token, persisted) = self.issue_session(ctx, user.id).await?;
        debug!(
            user_id = user.id,
            last_login_recorded = last_login.succeeded(),
            session_persisted = persisted.succeeded(),
            "Login succeeded"
        );

        Ok(AuthResponse {
            token,
            user: user.to_public(),
            session_persisted: persisted.succeeded(),
        })
    }

    /// Register a new user and log them in.
    ///
    /// # Errors
    ///
    /// - `HashingFailed` if the password cannot be hashed
    /// - `UserAlreadyExists` if the username or email is taken, either at the
    ///   pre-check or by the store's unique constraint at insert time
    /// - `PersistenceFailure` for any other store failure before the insert
    ///   completes, or when the session lifetime overflows the expiry date
    #[tracing::instrument(skip_all, fields(username = %input.username, trace_id = ctx.trace_id().unwrap_or_default()))]
    pub async fn register(
        &self,
        ctx: &RequestContext,
        input: RegisterInput,
    ) -> Result<AuthResponse, AuthServiceError> {
        let RegisterInput {
            username,
            email,
            password,
        } = input;

        let password_hash = self.hash_password(password).await?;

        if self
            .user_repo
            .exists_by_username_or_email(ctx, &username, &email)
            .await?
        {
            debug!("Username or email already taken");
            return Err(AuthServiceError::UserAlreadyExists);
        }

        // The pre-check races with concurrent registrations; the unique
        // constraint decides.
        let user_id = match self
            .user_repo
            .create(ctx, &username, &email, &password_hash)
            .await
        {
            Ok(id) => id,
            Err(StoreError::UniqueViolation(detail)) => {
                debug!(%detail, "Lost registration race");
                return Err(AuthServiceError::UserAlreadyExists);
            }
            Err(e) => return Err(e.into()),
        };

        let (token, persisted) = self.issue_session(ctx, user_id).await?;
        debug!(
            user_id,
            session_persisted = persisted.succeeded(),
            "Registration succeeded"
        );

        Ok(AuthResponse {
            token,
            user: PublicUser {
                id: user_id,
                username,
                email,
            },
            session_persisted: persisted.succeeded(),
        })
    }

    /// Resolve a bearer token to its user.
    ///
    /// Expiry is checked on every call: a session is valid only while the
    /// current time is strictly before its expiry.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if no session has this token
    /// - `SessionExpired` if the session's expiry has passed
    /// - `PersistenceFailure` if the lookup fails
    #[tracing::instrument(skip_all, fields(trace_id = ctx.trace_id().unwrap_or_default()))]
    pub async fn resolve_by_token(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<PublicUser, AuthServiceError> {
        let session = self
            .session_repo
            .find_by_token(ctx, token)
            .await?
            .ok_or(AuthServiceError::SessionNotFound)?;

        if session.is_expired_at(Utc::now()) {
            debug!(user_id = session.user_id, "Session expired");
            return Err(AuthServiceError::SessionExpired);
        }

        Ok(session.to_public())
    }

    /// Generate a token and try to store its session. The token is returned
    /// even when the store call fails.
    ///
    /// Fails only when the configured lifetime pushes the expiry past the
    /// representable date range.
    async fn issue_session(
        &self,
        ctx: &RequestContext,
        user_id: i64,
    ) -> Result<(String, BestEffort), AuthServiceError> {
        let now = Utc::now();
        let expires_at: DateTime<Utc> = now
            .checked_add_signed(self.session_lifetime)
            .ok_or_else(|| {
                StoreError::Other(anyhow::anyhow!(
                    "Session expiry out of range for a lifetime of {} hours",
                    self.session_lifetime.num_hours()
                ))
            })?;
        let token = generate_session_token(self.token_format, user_id, now);

        let outcome = BestEffort::observe(
            "create_session",
            user_id,
            self.session_repo
                .create(ctx, user_id, &token, expires_at)
                .await,
        );
        Ok((token, outcome))
    }

    async fn hash_password(&self, password: String) -> Result<String, HashError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| HashError::TaskAborted(e.to_string()))?
    }

    async fn verify_password(&self, digest: String, password: String) -> Result<bool, HashError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&digest, &password))
            .await
            .map_err(|e| HashError::TaskAborted(e.to_string()))?
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{FailingHasher, MemorySessionStore, MemoryUserStore};
    use super::*;
    use crate::services::password::fast_test_hasher;
    use std::sync::atomic::Ordering;

    struct Fixture {
        users: Arc<MemoryUserStore>,
        sessions: Arc<MemorySessionStore>,
        service: AuthService,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserStore::default());
        let sessions = Arc::new(MemorySessionStore::new(users.clone()));
        let service = AuthService::new(
            users.clone(),
            sessions.clone(),
            Arc::new(fast_test_hasher()),
        );
        Fixture {
            users,
            sessions,
            service,
        }
    }

    fn register_input(username: &str, email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn login_input(username: &str, password: &str) -> LoginInput {
        LoginInput {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    #[tokio::test]
    async fn test_register_issues_session() {
        let f = fixture();
        let ctx = RequestContext::background();

        let response = f
            .service
            .register(&ctx, register_input("alice", "alice@example.com", "password123"))
            .await
            .expect("Registration should succeed");

        assert!(!response.token.is_empty());
        assert!(response.session_persisted);
        assert_eq!(response.user.username, "alice");
        assert_eq!(response.user.email, "alice@example.com");
        assert_eq!(f.sessions.len(), 1);

        let stored = f.users.user("alice").expect("User should be stored");
        assert_eq!(stored.id, response.user.id);
        assert_ne!(stored.password_hash, "password123");
        assert!(stored.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_duplicate_username_does_not_insert() {
        let f = fixture();
        let ctx = RequestContext::background();
        f.users.insert("alice", "alice@example.com", "hash");

        let result = f
            .service
            .register(&ctx, register_input("alice", "new@example.com", "password123"))
            .await;

        assert!(matches!(result, Err(AuthServiceError::UserAlreadyExists)));
        assert_eq!(f.users.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.sessions.len(), 0);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_does_not_insert() {
        let f = fixture();
        let ctx = RequestContext::background();
        f.users.insert("alice", "alice@example.com", "hash");

        let result = f
            .service
            .register(&ctx, register_input("bob", "alice@example.com", "password123"))
            .await;

        assert!(matches!(result, Err(AuthServiceError::UserAlreadyExists)));
        assert_eq!(f.users.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_register_hashing_failure_touches_no_store() {
        let users = Arc::new(MemoryUserStore::default());
        let sessions = Arc::new(MemorySessionStore::new(users.clone()));
        let service = AuthService::new(users.clone(), sessions.clone(), Arc::new(FailingHasher));

        let result = service
            .register(
                &RequestContext::background(),
                register_input("alice", "alice@example.com", "password123"),
            )
            .await;

        assert!(matches!(
            result,
            Err(AuthServiceError::HashingFailed(HashError::Hash(_)))
        ));
        assert_eq!(users.create_calls.load(Ordering::SeqCst), 0);
        assert!(users.user("alice").is_none());
        assert_eq!(sessions.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(sessions.len(), 0);
    }

    #[tokio::test]
    async fn test_register_race_maps_to_user_already_exists() {
        let f = fixture();
        f.users.race_on_create.store(true, Ordering::SeqCst);

        let result = f
            .service
            .register(
                &RequestContext::background(),
                register_input("alice", "alice@example.com", "password123"),
            )
            .await;

        assert!(matches!(result, Err(AuthServiceError::UserAlreadyExists)));
        assert_eq!(f.users.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.sessions.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_register_with_failed_session_still_returns_token() {
        let f = fixture();
        f.sessions.fail_create.store(true, Ordering::SeqCst);
        let ctx = RequestContext::background();

        let response = f
            .service
            .register(&ctx, register_input("alice", "alice@example.com", "password123"))
            .await
            .expect("Registration should succeed despite session failure");

        assert!(!response.token.is_empty());
        assert!(!response.session_persisted);

        // The unstored token does not resolve
        let result = f.service.resolve_by_token(&ctx, &response.token).await;
        assert!(matches!(result, Err(AuthServiceError::SessionNotFound)));
    }

    // ========================================================================
    // Login
    // ========================================================================

    #[tokio::test]
    async fn test_login_unknown_user() {
        let f = fixture();
        let result = f
            .service
            .login(&RequestContext::background(), login_input("ghost", "password123"))
            .await;
        assert!(matches!(result, Err(AuthServiceError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let f = fixture();
        let ctx = RequestContext::background();
        f.service
            .register(&ctx, register_input("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        let result = f.service.login(&ctx, login_input("alice", "wrongpass")).await;
        assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
        assert_eq!(f.users.update_last_login_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_malformed_digest_is_invalid_credentials() {
        let f = fixture();
        f.users.insert("alice", "alice@example.com", "not-a-phc-string");

        let result = f
            .service
            .login(&RequestContext::background(), login_input("alice", "password123"))
            .await;
        assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_updates_last_login_and_sets_expiry() {
        let f = fixture();
        let ctx = RequestContext::background();
        f.service
            .register(&ctx, register_input("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        let before = Utc::now();
        let response = f
            .service
            .login(&ctx, login_input("alice", "password123"))
            .await
            .expect("Login should succeed");

        assert!(f.users.user("alice").unwrap().last_login.is_some());

        let expires_at = f.sessions.expiry_of(&response.token).unwrap();
        let lifetime = expires_at - before;
        assert!(lifetime >= Duration::hours(24));
        assert!(lifetime < Duration::hours(24) + Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_login_survives_last_login_failure() {
        let f = fixture();
        let ctx = RequestContext::background();
        f.service
            .register(&ctx, register_input("alice", "alice@example.com", "password123"))
            .await
            .unwrap();
        f.users.fail_update_last_login.store(true, Ordering::SeqCst);

        let response = f
            .service
            .login(&ctx, login_input("alice", "password123"))
            .await
            .expect("Login should succeed");

        assert!(response.session_persisted);
        assert_eq!(f.users.update_last_login_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_survives_session_failure() {
        let f = fixture();
        let ctx = RequestContext::background();
        f.service
            .register(&ctx, register_input("alice", "alice@example.com", "password123"))
            .await
            .unwrap();
        f.sessions.fail_create.store(true, Ordering::SeqCst);

        let response = f
            .service
            .login(&ctx, login_input("alice", "password123"))
            .await
            .expect("Login should succeed");

        assert!(!response.token.is_empty());
        assert!(!response.session_persisted);
        let result = f.service.resolve_by_token(&ctx, &response.token).await;
        assert!(matches!(result, Err(AuthServiceError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_login_lookup_failure_is_persistence_failure() {
        let f = fixture();
        f.users.fail_lookups.store(true, Ordering::SeqCst);

        let err = f
            .service
            .login(&RequestContext::background(), login_input("alice", "password123"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthServiceError::PersistenceFailure(_)));
        assert!(err.is_infrastructure());
    }

    #[tokio::test]
    async fn test_best_effort_session_write_respects_deadline() {
        let f = fixture();
        f.service
            .register(
                &RequestContext::background(),
                register_input("alice", "alice@example.com", "password123"),
            )
            .await
            .unwrap();
        *f.sessions.create_delay.lock().unwrap() = Some(std::time::Duration::from_secs(30));

        let ctx = RequestContext::background().with_timeout(std::time::Duration::from_millis(500));
        let started = std::time::Instant::now();
        let response = f
            .service
            .login(&ctx, login_input("alice", "password123"))
            .await
            .expect("Login should succeed");

        assert!(!response.session_persisted);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_login() {
        let f = fixture();
        let ctx = RequestContext::background();
        ctx.cancel();

        let result = f.service.login(&ctx, login_input("alice", "password123")).await;
        assert!(matches!(
            result,
            Err(AuthServiceError::PersistenceFailure(StoreError::Cancelled(_)))
        ));
    }

    // ========================================================================
    // Token resolution
    // ========================================================================

    #[tokio::test]
    async fn test_resolve_unknown_token() {
        let f = fixture();
        let result = f
            .service
            .resolve_by_token(&RequestContext::background(), "bogus-token")
            .await;
        assert!(matches!(result, Err(AuthServiceError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_resolve_expired_token() {
        let f = fixture();
        let user_id = f.users.insert("alice", "alice@example.com", "hash");
        f.sessions
            .insert(user_id, "expired", Utc::now() - Duration::seconds(1));

        let result = f
            .service
            .resolve_by_token(&RequestContext::background(), "expired")
            .await;
        assert!(matches!(result, Err(AuthServiceError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_resolve_token_one_second_before_expiry() {
        let f = fixture();
        let user_id = f.users.insert("alice", "alice@example.com", "hash");
        f.sessions
            .insert(user_id, "almost", Utc::now() + Duration::seconds(1));

        let user = f
            .service
            .resolve_by_token(&RequestContext::background(), "almost")
            .await
            .expect("Session should still be valid");
        assert_eq!(user.id, user_id);
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn test_custom_session_lifetime() {
        let users = Arc::new(MemoryUserStore::default());
        let sessions = Arc::new(MemorySessionStore::new(users.clone()));
        let service = AuthService::new(users, sessions.clone(), Arc::new(fast_test_hasher()))
            .with_session_lifetime(Duration::seconds(-1));
        let ctx = RequestContext::background();

        let response = service
            .register(&ctx, register_input("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        let result = service.resolve_by_token(&ctx, &response.token).await;
        assert!(matches!(result, Err(AuthServiceError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_out_of_range_session_lifetime_is_an_error() {
        let users = Arc::new(MemoryUserStore::default());
        let sessions = Arc::new(MemorySessionStore::new(users.clone()));
        let service = AuthService::new(users.clone(), sessions.clone(), Arc::new(fast_test_hasher()))
            .with_session_lifetime(Duration::hours(100_000_000_000));
        let ctx = RequestContext::background();

        let result = service
            .register(&ctx, register_input("alice", "alice@example.com", "password123"))
            .await;
        assert!(matches!(result, Err(AuthServiceError::PersistenceFailure(_))));
        assert_eq!(sessions.create_calls.load(Ordering::SeqCst), 0);

        let result = service.login(&ctx, login_input("alice", "password123")).await;
        assert!(matches!(result, Err(AuthServiceError::PersistenceFailure(_))));
        assert_eq!(sessions.len(), 0);
    }

    #[tokio::test]
    async fn test_legacy_token_format() {
        let users = Arc::new(MemoryUserStore::default());
        let sessions = Arc::new(MemorySessionStore::new(users.clone()));
        let service = AuthService::new(users, sessions, Arc::new(fast_test_hasher()))
            .with_token_format(TokenFormat::Legacy);

        let response = service
            .register(
                &RequestContext::background(),
                register_input("alice", "alice@example.com", "password123"),
            )
            .await
            .unwrap();

        let expected_prefix = format!("jwt-token-v1-{}-", response.user.id);
        assert!(response.token.starts_with(&expected_prefix));
    }

    // ========================================================================
    // End-to-end scenario
    // ========================================================================

    #[tokio::test]
    async fn test_register_login_resolve_scenario() {
        let f = fixture();
        let ctx = RequestContext::background();

        let registered = f
            .service
            .register(&ctx, register_input("alice", "alice@example.com", "password123"))
            .await
            .expect("Registration should succeed");
        assert!(!registered.token.is_empty());
        assert_eq!(registered.user.username, "alice");
        assert_eq!(registered.user.email, "alice@example.com");

        let logged_in = f
            .service
            .login(&ctx, login_input("alice", "password123"))
            .await
            .expect("Login should succeed");
        assert_ne!(logged_in.token, registered.token);

        let wrong = f.service.login(&ctx, login_input("alice", "wrongpass")).await;
        assert!(matches!(wrong, Err(AuthServiceError::InvalidCredentials)));

        let me = f
            .service
            .resolve_by_token(&ctx, &logged_in.token)
            .await
            .expect("Token should resolve");
        assert_eq!(me, registered.user);

        let bogus = f.service.resolve_by_token(&ctx, "bogus-token").await;
        assert!(matches!(bogus, Err(AuthServiceError::SessionNotFound)));
    }

    #[test]
    fn test_error_classification() {
        let caller = [
            AuthServiceError::UserNotFound,
            AuthServiceError::InvalidCredentials,
            AuthServiceError::PasswordExpired,
            AuthServiceError::AccountLocked,
            AuthServiceError::Unauthorized,
            AuthServiceError::UserAlreadyExists,
            AuthServiceError::SessionNotFound,
            AuthServiceError::SessionExpired,
        ];
        for err in &caller {
            assert!(err.is_caller_error(), "{err} should be a caller error");
        }

        let infra = [
            AuthServiceError::HashingFailed(HashError::Hash("entropy".to_string())),
            AuthServiceError::PersistenceFailure(StoreError::DeadlineExceeded("create_user")),
        ];
        for err in &infra {
            assert!(err.is_infrastructure(), "{err} should be infrastructure");
            assert!(!err.is_caller_error());
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::test_support::{FailingHasher, MemorySessionStore, MemoryUserStore};
    use super::*;
    use crate::services::password::fast_test_hasher;
    use proptest::prelude::*;

    fn service() -> AuthService {
        let users = Arc::new(MemoryUserStore::default());
        let sessions = Arc::new(MemorySessionStore::new(users.clone()));
        AuthService::new(users, sessions, Arc::new(fast_test_hasher()))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Registered credentials log in, and the response exposes exactly the
        /// stored username and email.
        #[test]
        fn property_register_then_login_roundtrip(
            username in "[a-z]{3,10}",
            email_prefix in "[a-z]{3,10}",
            password in "[a-zA-Z0-9!@#$%^&*]{8,20}"
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let service = service();
                let ctx = RequestContext::background();
                let email = format!("{}@example.com", email_prefix);

                service
                    .register(&ctx, RegisterInput {
                        username: username.clone(),
                        email: email.clone(),
                        password: password.clone(),
                    })
                    .await
                    .unwrap();

                let response = service
                    .login(&ctx, LoginInput { username: username.clone(), password })
                    .await
                    .unwrap();

                prop_assert_eq!(&response.user.username, &username);
                prop_assert_eq!(&response.user.email, &email);

                let json = serde_json::to_string(&response).unwrap();
                prop_assert!(!json.contains("argon2"));
                Ok(())
            });
            result?;
        }

        /// Any password other than the registered one is rejected.
        #[test]
        fn property_wrong_password_rejected(
            password in "[a-z0-9]{8,16}",
            wrong in "[a-z0-9]{8,16}"
        ) {
            prop_assume!(password != wrong);
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let service = service();
                let ctx = RequestContext::background();

                service
                    .register(&ctx, RegisterInput {
                        username: "alice".to_string(),
                        email: "alice@example.com".to_string(),
                        password,
                    })
                    .await
                    .unwrap();

                let result = service
                    .login(&ctx, LoginInput { username: "alice".to_string(), password: wrong })
                    .await;
                prop_assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
                Ok(())
            });
            result?;
        }
    }
}
