//! Session model

use chrono::{DateTime, Utc};

use super::PublicUser;

/// Session joined with its owning user, as returned by a token lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLookup {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionLookup {
    /// A session is valid only while `now` is strictly before its expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}
