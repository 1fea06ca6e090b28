//! Rate limiting configuration

use serde::{Deserialize, Serialize};

use super::env_or;

/// Sliding-window admission control applied to every RPC call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Enable the rate limiting stage
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Requests admitted per client within one window
    pub max_requests: u32,

    /// Window length in seconds
    pub window_seconds: u64,

    /// Interval for dropping idle client buckets in seconds; 0 keeps every bucket
    #[serde(default)]
    pub idle_sweep_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_requests: 100,
            window_seconds: 60,
            idle_sweep_seconds: 0,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_or("RATE_LIMIT_ENABLED", defaults.enabled),
            max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests),
            window_seconds: env_or("RATE_LIMIT_WINDOW_SECS", defaults.window_seconds),
            idle_sweep_seconds: env_or("RATE_LIMIT_IDLE_SWEEP_SECS", defaults.idle_sweep_seconds),
        }
    }

    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && (self.max_requests == 0 || self.window_seconds == 0) {
            return Err("rate limit count and window must be positive".to_string());
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}
