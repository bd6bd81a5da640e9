//! Authentication request and response value objects

use serde::{Deserialize, Serialize};

use super::PublicUser;

/// Input for logging in
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Input for registering a new user
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Issued token plus the public view of the authenticated user
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
    /// Whether the session row was stored. A token whose session failed to
    /// persist will not resolve later.
    #[serde(skip_serializing)]
    pub session_persisted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_hides_persistence_flag() {
        let response = AuthResponse {
            token: "abc".to_string(),
            user: PublicUser {
                id: 1,
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            },
            session_persisted: false,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "token": "abc",
                "user": {"id": 1, "username": "alice", "email": "alice@example.com"}
            })
        );
    }

    #[test]
    fn test_register_input_deserialize() {
        let input: RegisterInput = serde_json::from_str(
            r#"{"username":"alice","email":"alice@example.com","password":"password123"}"#,
        )
        .unwrap();
        assert_eq!(input.username, "alice");
        assert_eq!(input.email, "alice@example.com");
        assert_eq!(input.password, "password123");
    }
}
