//! auth-service - an authentication core
//!
//! Verifies user credentials, issues and validates bearer session tokens, and
//! enforces uniqueness of identity records. Storage sits behind the store
//! traits in [`db::repositories`]; HTTP lives in [`api`].

pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod models;
pub mod services;
