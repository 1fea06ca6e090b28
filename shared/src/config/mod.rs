//! Configuration module with business-specific sub-modules
//!
//! - `auth` - JWT signing and token cleanup configuration
//! - `database` - Storage backend selection and pool configuration
//! - `environment` - Environment detection and logging configuration
//! - `rate_limit` - Per-client admission control
//! - `server` - RPC listener, HTTP gateway, TLS, health and CORS configuration

pub mod auth;
pub mod database;
pub mod environment;
pub mod rate_limit;
pub mod server;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use auth::{CleanupConfig, JwtConfig};
pub use database::DatabaseConfig;
pub use environment::{Environment, LogFormat, LoggingConfig};
pub use rate_limit::RateLimitConfig;
pub use server::{CorsConfig, HealthConfig, ServerConfig, TlsConfig, TlsVersion};

/// Complete application configuration combining all sub-configurations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let env = Environment::default();
        Self {
            environment: env,
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            jwt: JwtConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cleanup: CleanupConfig::default(),
            cors: CorsConfig::default(),
            logging: LoggingConfig::for_environment(env),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let environment = Environment::from_env();
        let mut logging = LoggingConfig::for_environment(environment);
        logging.apply_env();

        Self {
            environment,
            server: ServerConfig::from_env(),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            cleanup: CleanupConfig::from_env(),
            cors: if environment.is_development() {
                CorsConfig::development()
            } else {
                CorsConfig::default()
            },
            logging,
        }
    }

    /// Check cross-field constraints that would make the service unsafe to start
    pub fn validate(&self) -> Result<(), String> {
        self.jwt.validate()?;
        self.rate_limit.validate()?;
        self.server.validate()?;
        if self.environment.is_production() && self.jwt.is_using_default_secrets() {
            return Err("default JWT secrets must not be used in production".to_string());
        }
        Ok(())
    }
}

/// Read an environment variable and parse it, falling back to `default`
/// when the variable is unset or malformed.
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a non-empty string environment variable
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_production_rejects_default_secrets() {
        let config = AppConfig {
            environment: Environment::Production,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("AUTHGATE_TEST_ENV_OR", "not-a-number");
        assert_eq!(env_or("AUTHGATE_TEST_ENV_OR", 7u32), 7);
        std::env::set_var("AUTHGATE_TEST_ENV_OR", " 42 ");
        assert_eq!(env_or("AUTHGATE_TEST_ENV_OR", 7u32), 42);
        std::env::remove_var("AUTHGATE_TEST_ENV_OR");
    }
}
