//! Services layer - Business logic
//!
//! This module contains the authentication core:
//! - `auth`: login, registration and token resolution
//! - `password`: Argon2id credential hashing
//! - `token`: session token generation

pub mod auth;
pub mod password;
pub mod token;

pub use auth::{AuthService, AuthServiceError, BestEffort};
pub use password::{Argon2Hasher, CredentialHasher, HashError};
pub use token::generate_session_token;
