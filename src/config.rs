//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub fanout: FanoutConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8789)
    pub port: u16,
    /// Public origin used to build avatar URLs (e.g., "http://localhost:8789")
    pub origin: String,
}

impl ServerConfig {
    /// Origin without a trailing slash
    pub fn base_url(&self) -> &str {
        self.origin.trim_end_matches('/')
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Pool size
    pub max_connections: u32,
    /// How long a writer waits for the write lock before failing
    pub busy_timeout_seconds: u64,
}

/// Token configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Token signing secret (32+ bytes)
    pub token_secret: String,
    /// Token lifetime in seconds (default: 1209600 = 14 days)
    pub token_ttl_seconds: i64,
}

/// Avatar storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory avatar files are written to and served from
    pub avatars_dir: PathBuf,
}

/// Timeline fan-out worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FanoutConfig {
    /// Poll interval when no wake-up signal arrives
    pub poll_interval_ms: u64,
    /// Maximum tasks claimed per pass
    pub batch_size: i64,
    /// Attempts before a task is parked
    pub max_attempts: i64,
    /// Base retry delay, multiplied by the attempt count
    pub retry_backoff_seconds: i64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            batch_size: 32,
            max_attempts: 8,
            retry_backoff_seconds: 5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SOCNET__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8789)?
            .set_default("server.origin", "http://localhost:8789")?
            .set_default("database.path", "data/socnet.db")?
            .set_default("database.max_connections", 8)?
            .set_default("database.busy_timeout_seconds", 10)?
            .set_default("auth.token_ttl_seconds", 1_209_600)?
            .set_default("storage.avatars_dir", "web/static/img/avatars")?
            .set_default("fanout.poll_interval_ms", 1000)?
            .set_default("fanout.batch_size", 32)?
            .set_default("fanout.max_attempts", 8)?
            .set_default("fanout.retry_backoff_seconds", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SOCNET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_TOKEN_SECRET_BYTES: usize = 32;

        if self.auth.token_secret.len() < MIN_TOKEN_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.token_secret must be at least {} bytes",
                MIN_TOKEN_SECRET_BYTES
            )));
        }

        if self.auth.token_ttl_seconds <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.token_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if url::Url::parse(&self.server.origin).is_err() {
            return Err(crate::error::AppError::Config(format!(
                "server.origin is not a valid URL: {}",
                self.server.origin
            )));
        }

        if self.database.max_connections == 0 {
            return Err(crate::error::AppError::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.fanout.batch_size <= 0 || self.fanout.max_attempts <= 0 {
            return Err(crate::error::AppError::Config(
                "fanout.batch_size and fanout.max_attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
