//! Database configuration module

use serde::{Deserialize, Serialize};

use super::{env_or, env_string};

/// Storage configuration. An empty URL or `memory://` selects the in-process store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    #[serde(default)]
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout: u64,

    /// Idle connection timeout in seconds
    pub idle_timeout: u64,

    /// Maximum lifetime of a connection in seconds
    pub max_lifetime: u64,

    /// Create missing tables on startup
    #[serde(default = "default_ensure_schema")]
    pub ensure_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::from("memory://"),
            max_connections: 10,
            min_connections: 0,
            connect_timeout: 30,
            idle_timeout: 600,
            max_lifetime: 1800,
            ensure_schema: default_ensure_schema(),
        }
    }
}

impl DatabaseConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env_string("DATABASE_URL").unwrap_or(defaults.url),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: env_or("DATABASE_MIN_CONNECTIONS", defaults.min_connections),
            connect_timeout: env_or("DATABASE_CONNECT_TIMEOUT", defaults.connect_timeout),
            idle_timeout: env_or("DATABASE_IDLE_TIMEOUT", defaults.idle_timeout),
            max_lifetime: env_or("DATABASE_MAX_LIFETIME", defaults.max_lifetime),
            ensure_schema: env_or("DATABASE_ENSURE_SCHEMA", defaults.ensure_schema),
        }
    }

    /// Create a new database configuration with URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of connections
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Whether the in-process store is selected
    pub fn is_in_memory(&self) -> bool {
        let url = self.url.trim();
        url.is_empty() || url.starts_with("memory:")
    }
}

fn default_ensure_schema() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_selection() {
        assert!(DatabaseConfig::default().is_in_memory());
        assert!(DatabaseConfig::new("").is_in_memory());
        assert!(!DatabaseConfig::new("mysql://localhost:3306/authgate").is_in_memory());
    }
}
