//! Token signing and token housekeeping configuration

use serde::{Deserialize, Serialize};

use super::{env_or, env_string};

const DEFAULT_ACCESS_SECRET: &str = "change-me-access-secret";
const DEFAULT_REFRESH_SECRET: &str = "change-me-refresh-secret";

/// JWT configuration. Access and refresh tokens are signed with distinct secrets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JwtConfig {
    /// Secret for signing access tokens
    pub access_secret: String,

    /// Secret for signing refresh tokens
    pub refresh_secret: String,

    /// Access token lifetime in seconds
    pub access_token_expiry: i64,

    /// Refresh token lifetime in seconds
    pub refresh_token_expiry: i64,

    /// JWT issuer claim
    pub issuer: String,

    /// Clock skew tolerated when checking `exp`, in seconds
    #[serde(default)]
    pub leeway: u64,

    /// bcrypt cost factor for password hashing
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_secret: String::from(DEFAULT_ACCESS_SECRET),
            refresh_secret: String::from(DEFAULT_REFRESH_SECRET),
            access_token_expiry: 900,     // 15 minutes
            refresh_token_expiry: 604800, // 7 days
            issuer: String::from("authgate"),
            leeway: 0,
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl JwtConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            access_secret: env_string("JWT_ACCESS_SECRET").unwrap_or(defaults.access_secret),
            refresh_secret: env_string("JWT_REFRESH_SECRET").unwrap_or(defaults.refresh_secret),
            access_token_expiry: env_or("JWT_ACCESS_TTL_SECS", defaults.access_token_expiry),
            refresh_token_expiry: env_or("JWT_REFRESH_TTL_SECS", defaults.refresh_token_expiry),
            issuer: env_string("JWT_ISSUER").unwrap_or(defaults.issuer),
            leeway: env_or("JWT_LEEWAY_SECS", defaults.leeway),
            bcrypt_cost: env_or("BCRYPT_COST", defaults.bcrypt_cost),
        }
    }

    /// Create a configuration with explicit secrets
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            ..Default::default()
        }
    }

    /// Set both token lifetimes in seconds
    pub fn with_lifetimes(mut self, access_seconds: i64, refresh_seconds: i64) -> Self {
        self.access_token_expiry = access_seconds;
        self.refresh_token_expiry = refresh_seconds;
        self
    }

    /// Check if using the built-in secrets (security warning)
    pub fn is_using_default_secrets(&self) -> bool {
        self.access_secret == DEFAULT_ACCESS_SECRET || self.refresh_secret == DEFAULT_REFRESH_SECRET
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err("JWT secrets must not be empty".to_string());
        }
        if self.access_secret == self.refresh_secret {
            return Err("access and refresh tokens must use distinct secrets".to_string());
        }
        if self.access_token_expiry <= 0 {
            return Err("access token lifetime must be positive".to_string());
        }
        if self.refresh_token_expiry <= self.access_token_expiry {
            return Err("refresh token lifetime must exceed access token lifetime".to_string());
        }
        Ok(())
    }
}

/// Periodic removal of token rows whose refresh expiry has passed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupConfig {
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,

    /// Interval between cleanup runs in seconds
    #[serde(default = "default_cleanup_interval")]
    pub interval_seconds: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: default_cleanup_enabled(),
            interval_seconds: default_cleanup_interval(),
        }
    }
}

impl CleanupConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: env_or("TOKEN_CLEANUP_ENABLED", default_cleanup_enabled()),
            interval_seconds: env_or("TOKEN_CLEANUP_INTERVAL_SECS", default_cleanup_interval()),
        }
    }
}

fn default_bcrypt_cost() -> u32 {
    12
}

fn default_cleanup_enabled() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    3600 // 1 hour
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_validate_rejects_shared_secret() {
        let config = JwtConfig::new("same", "same");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_jwt_validate_rejects_refresh_not_longer_than_access() {
        let config = JwtConfig::new("a", "r").with_lifetimes(600, 600);
        assert!(config.validate().is_err());
        let config = JwtConfig::new("a", "r").with_lifetimes(600, 601);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_secrets_detected() {
        assert!(JwtConfig::default().is_using_default_secrets());
        assert!(!JwtConfig::new("a", "r").is_using_default_secrets());
    }
}
