//! Configuration management
//!
//! This module handles loading and parsing configuration for the auth service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix shared by every environment override.
const ENV_PREFIX: &str = "AUTH_SERVICE_";

/// Upper bound for `auth.session_lifetime_hours` (100 years)
pub const MAX_SESSION_LIFETIME_HOURS: i64 = 24 * 365 * 100;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Shutdown configuration
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Upper bound on pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/auth.db".to_string()
}

fn default_max_connections() -> u32 {
    20
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Shape of issued session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenFormat {
    /// 64 hex chars of randomness
    #[default]
    Opaque,
    /// `jwt-token-v1-{user_id}-{unix_seconds}`, predictable
    Legacy,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of an issued session
    #[serde(default = "default_session_lifetime_hours")]
    pub session_lifetime_hours: i64,
    /// Deadline applied to the store calls of one request
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Token scheme for new sessions
    #[serde(default)]
    pub token_format: TokenFormat,
    /// Interval of the expired-session purge task, 0 disables it
    #[serde(default)]
    pub session_purge_interval_secs: u64,
    /// Password hashing work factor
    #[serde(default)]
    pub hashing: HashingConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_lifetime_hours: default_session_lifetime_hours(),
            operation_timeout_ms: default_operation_timeout_ms(),
            token_format: TokenFormat::default(),
            session_purge_interval_secs: 0,
            hashing: HashingConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Clamped to `MAX_SESSION_LIFETIME_HOURS` in both directions
    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(
            self.session_lifetime_hours
                .clamp(-MAX_SESSION_LIFETIME_HOURS, MAX_SESSION_LIFETIME_HOURS),
        )
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// `None` when purging is disabled
    pub fn session_purge_interval(&self) -> Option<Duration> {
        (self.session_purge_interval_secs > 0)
            .then(|| Duration::from_secs(self.session_purge_interval_secs))
    }
}

fn default_session_lifetime_hours() -> i64 {
    24
}

fn default_operation_timeout_ms() -> u64 {
    5000
}

/// Argon2id parameters. Defaults match the argon2 crate's recommended values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashingConfig {
    /// Memory cost in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Number of passes
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Degree of parallelism
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

fn default_memory_kib() -> u32 {
    argon2::Params::DEFAULT_M_COST
}

fn default_iterations() -> u32 {
    argon2::Params::DEFAULT_T_COST
}

fn default_parallelism() -> u32 {
    argon2::Params::DEFAULT_P_COST
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Graceful shutdown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Time in-flight requests get to finish once shutdown starts
    #[serde(default = "default_shutdown_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay between failing readiness and closing the listener
    #[serde(default)]
    pub readiness_drain_delay_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_shutdown_timeout_secs(),
            readiness_drain_delay_secs: 0,
        }
    }
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn readiness_drain_delay(&self) -> Duration {
        Duration::from_secs(self.readiness_drain_delay_secs)
    }
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        // Handle empty file - return defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern `AUTH_SERVICE_<SECTION>_<KEY>`:
    /// - AUTH_SERVICE_SERVER_HOST
    /// - AUTH_SERVICE_SERVER_PORT
    /// - AUTH_SERVICE_DATABASE_DRIVER
    /// - AUTH_SERVICE_DATABASE_URL
    /// - AUTH_SERVICE_DATABASE_MAX_CONNECTIONS
    /// - AUTH_SERVICE_AUTH_SESSION_LIFETIME_HOURS
    /// - AUTH_SERVICE_AUTH_OPERATION_TIMEOUT_MS
    /// - AUTH_SERVICE_AUTH_TOKEN_FORMAT
    /// - AUTH_SERVICE_SESSION_PURGE_INTERVAL_SECS
    /// - AUTH_SERVICE_LOG_LEVEL
    /// - AUTH_SERVICE_SHUTDOWN_TIMEOUT_SECS
    /// - AUTH_SERVICE_SHUTDOWN_DRAIN_DELAY_SECS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be non-zero".to_string(),
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url cannot be empty".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.auth.session_lifetime_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_lifetime_hours must be positive".to_string(),
            ));
        }
        if self.auth.session_lifetime_hours > MAX_SESSION_LIFETIME_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "auth.session_lifetime_hours must be at most {}",
                MAX_SESSION_LIFETIME_HOURS
            )));
        }
        if self.auth.operation_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "auth.operation_timeout_ms must be positive".to_string(),
            ));
        }

        let hashing = &self.auth.hashing;
        argon2::Params::new(hashing.memory_kib, hashing.iterations, hashing.parallelism, None)
            .map_err(|e| ConfigError::ValidationError(format!("auth.hashing: {}", e)))?;

        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Some(host) = env_var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("SERVER_PORT") {
            self.server.port = port;
        }

        // Database configuration
        if let Some(driver) = env_var("DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Some(url) = env_var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max) = env_parse::<u32>("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = max;
        }

        // Auth configuration
        if let Some(hours) = env_parse::<i64>("AUTH_SESSION_LIFETIME_HOURS") {
            self.auth.session_lifetime_hours = hours;
        }
        if let Some(ms) = env_parse::<u64>("AUTH_OPERATION_TIMEOUT_MS") {
            self.auth.operation_timeout_ms = ms;
        }
        if let Some(format) = env_var("AUTH_TOKEN_FORMAT") {
            match format.to_lowercase().as_str() {
                "opaque" => self.auth.token_format = TokenFormat::Opaque,
                "legacy" => self.auth.token_format = TokenFormat::Legacy,
                _ => {}
            }
        }
        if let Some(secs) = env_parse::<u64>("SESSION_PURGE_INTERVAL_SECS") {
            self.auth.session_purge_interval_secs = secs;
        }

        // Logging and shutdown
        if let Some(level) = env_var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(secs) = env_parse::<u64>("SHUTDOWN_TIMEOUT_SECS") {
            self.shutdown.timeout_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>("SHUTDOWN_DRAIN_DELAY_SECS") {
            self.shutdown.readiness_drain_delay_secs = secs;
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, key)).ok()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|value| value.parse::<T>().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
