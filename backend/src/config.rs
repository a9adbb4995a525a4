//! Configuration management for the SCM back office
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with SCM__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, staging, production)
    pub environment: String,

    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT verification configuration
    pub jwt: JwtConfig,

    /// Inventory configuration
    pub inventory: InventoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,

    /// Apply pending migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify bearer tokens
    pub secret: String,

    /// Clock skew tolerated when checking `exp`, in seconds
    pub leeway_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    /// Capacity of the queue feeding the notification worker
    pub alert_queue_capacity: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("SCM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("log_json", false)?
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.run_migrations", environment == "development")?
            .set_default("jwt.leeway_secs", 60)?
            .set_default("inventory.alert_queue_capacity", 1024)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SCM__ prefix)
            .add_source(
                Environment::with_prefix("SCM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_everything_but_secrets() {
        let config = config::Config::builder()
            .set_default("environment", "test")
            .unwrap()
            .set_default("log_json", false)
            .unwrap()
            .set_default("server.port", 8000)
            .unwrap()
            .set_default("server.host", "127.0.0.1")
            .unwrap()
            .set_default("database.url", "postgres://localhost/scm")
            .unwrap()
            .set_default("database.max_connections", 10)
            .unwrap()
            .set_default("database.min_connections", 2)
            .unwrap()
            .set_default("database.acquire_timeout_secs", 30)
            .unwrap()
            .set_default("database.run_migrations", false)
            .unwrap()
            .set_default("jwt.secret", "s3cret")
            .unwrap()
            .set_default("jwt.leeway_secs", 60)
            .unwrap()
            .set_default("inventory.alert_queue_capacity", 16)
            .unwrap()
            .build()
            .unwrap();

        let parsed: Config = config.try_deserialize().unwrap();
        assert_eq!(parsed.server.port, 8000);
        assert_eq!(parsed.inventory.alert_queue_capacity, 16);
        assert!(!parsed.is_development());
    }
}
