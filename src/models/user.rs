//! User model
//!
//! The persisted identity record and the public-safe view that leaves the
//! service. The password hash never appears in the public view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity record as stored in the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier, assigned by the store
    pub id: i64,
    /// Username (unique, immutable)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2 PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last successful login
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Public-safe view of this identity
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// Public-safe user view: identifier, username and email only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_user_serialization_skips_password_hash() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret"));
        assert!(json.contains("\"username\":\"alice\""));
    }

    #[test]
    fn test_to_public() {
        let public = sample_user().to_public();
        assert_eq!(
            public,
            PublicUser {
                id: 7,
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            }
        );
    }

    #[test]
    fn test_public_user_json_shape() {
        let public: PublicUser = sample_user().into();
        let value = serde_json::to_value(&public).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"id": 7, "username": "alice", "email": "alice@example.com"})
        );
    }
}
