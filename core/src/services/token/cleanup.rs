//! Periodic removal of token rows whose refresh token has expired.
//!
//! Cleanup is best-effort: a failed cycle is logged and the next one runs on
//! schedule.

use std::sync::Arc;
use std::time::Duration;

use ag_shared::config::CleanupConfig;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::DomainError;
use crate::repositories::TokenRepository;

/// Configuration for token cleanup service
#[derive(Debug, Clone)]
pub struct TokenCleanupConfig {
    /// How often to run cleanup (in seconds)
    pub interval_seconds: u64,
    /// Whether to enable automatic cleanup
    pub enabled: bool,
}

impl Default for TokenCleanupConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 3600, // Run every hour
            enabled: true,
        }
    }
}

impl From<&CleanupConfig> for TokenCleanupConfig {
    fn from(config: &CleanupConfig) -> Self {
        Self {
            interval_seconds: config.interval_seconds,
            enabled: config.enabled,
        }
    }
}

/// Service for cleaning up expired token rows
pub struct TokenCleanupService {
    repository: Arc<dyn TokenRepository>,
    config: TokenCleanupConfig,
}

impl TokenCleanupService {
    pub fn new(repository: Arc<dyn TokenRepository>, config: TokenCleanupConfig) -> Self {
        Self { repository, config }
    }

    /// Run a single cleanup cycle
    ///
    /// # Returns
    /// * `Ok(CleanupResult)` - Summary of the cycle; storage failures are
    ///   recorded in `errors` rather than returned
    /// * `Err(DomainError)` - Reserved for failures outside the storage call
    pub async fn run_cleanup(&self) -> Result<CleanupResult, DomainError> {
        if !self.config.enabled {
            return Ok(CleanupResult::default());
        }

        let mut result = CleanupResult::default();
        match self.repository.cleanup_expired().await {
            Ok(count) => {
                result.expired_tokens_deleted = count;
                if count > 0 {
                    info!(deleted = count, "Deleted expired token rows");
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to cleanup expired tokens");
                result.errors.push(format!("Token cleanup error: {}", e));
            }
        }

        Ok(result)
    }

    /// Start the cleanup service as a background task
    ///
    /// Returns the task handle so the caller can stop it on shutdown, or
    /// `None` when cleanup is disabled.
    pub fn start_background_task(self: Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.enabled || self.config.interval_seconds == 0 {
            warn!("Token cleanup service is disabled");
            return None;
        }

        let interval = Duration::from_secs(self.config.interval_seconds);

        Some(tokio::spawn(async move {
            info!(
                interval_seconds = self.config.interval_seconds,
                "Token cleanup service started"
            );

            let mut interval_timer = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so startup stays quiet
            interval_timer.tick().await;

            loop {
                interval_timer.tick().await;

                match self.run_cleanup().await {
                    Ok(result) if !result.is_success() => {
                        warn!(errors = ?result.errors, "Cleanup completed with errors");
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Token cleanup cycle failed"),
                }
            }
        }))
    }
}

/// Result of a cleanup operation
#[derive(Debug, Default)]
pub struct CleanupResult {
    /// Number of expired token rows deleted
    pub expired_tokens_deleted: u64,
    /// Any errors encountered during cleanup
    pub errors: Vec<String>,
}

impl CleanupResult {
    /// Check if the cleanup was successful (no errors)
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
