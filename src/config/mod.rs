//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `CMMS_LICENSING` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use cmms_licensing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Grace period: {} days", config.licensing.grace_period_days);
//! ```

mod database;
mod error;
mod licensing;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use licensing::LicensingConfig;
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection; in-memory stores are used when absent
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Grace period, default terms, sweep and catalog
    #[serde(default)]
    pub licensing: LicensingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CMMS_LICENSING` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CMMS_LICENSING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `CMMS_LICENSING__DATABASE__URL=...` -> `database.url = ...`
    /// - `CMMS_LICENSING__LICENSING__GRACE_PERIOD_DAYS=10` -> `licensing.grace_period_days = 10`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CMMS_LICENSING")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.licensing.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
