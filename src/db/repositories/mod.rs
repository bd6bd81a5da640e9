//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository exposes the store contract the auth service consumes.

pub mod session;
pub mod user;

pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
