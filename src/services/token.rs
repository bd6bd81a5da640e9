//! Session token generation
//!
//! Tokens are opaque bearer strings; the server only ever looks them up.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::TokenFormat;

/// Prefix of tokens in the legacy format
pub const LEGACY_TOKEN_PREFIX: &str = "jwt-token-v1-";

/// Generate a token for a new session of `user_id`.
///
/// - `Opaque`: 64 lowercase hex characters (two random v4 UUIDs, 244 random bits)
/// - `Legacy`: `jwt-token-v1-{user_id}-{unix_seconds}`. Predictable, and two
///   sessions for the same user in the same second get the same token.
pub fn generate_session_token(
    format: TokenFormat,
    user_id: i64,
    issued_at: DateTime<Utc>,
) -> String {
    match format {
        TokenFormat::Opaque => format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
        TokenFormat::Legacy => format!(
            "{}{}-{}",
            LEGACY_TOKEN_PREFIX,
            user_id,
            issued_at.timestamp()
        ),
    }
}
