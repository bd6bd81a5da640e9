//! Data models
//!
//! This module contains the data structures shared by the store, service and
//! transport layers:
//! - Database entities (User) and the joined session lookup
//! - API request/response types

mod auth;
mod session;
mod user;

pub use auth::{AuthResponse, LoginInput, RegisterInput};
pub use session::SessionLookup;
pub use user::{PublicUser, User};
