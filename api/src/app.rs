//! Service graph shared by both listeners
//!
//! Every stateful component is built here once and handed to its users by
//! reference; nothing is reached through process-wide globals.

use std::sync::Arc;

use ag_core::services::{
    AuthServiceConfig, BcryptHasher, SlidingWindowRateLimiter, TokenCleanupConfig,
    TokenCleanupService, TokenServiceConfig,
};
use ag_core::{AuthService, DomainError, RevocationCache, StorageProbe, TokenService};
use ag_infra::Storage;
use ag_shared::config::AppConfig;
use prometheus::Registry;
use tokio::task::JoinHandle;
use tracing::info;

use crate::middleware::{
    AccessLogMiddleware, Middleware, MetricsMiddleware, Pipeline, RateLimitMiddleware,
    RecoveryMiddleware, RpcMetrics, SecurityMiddleware,
};
use crate::rpc::{AuthRpc, HealthRpc};
use crate::server::shutdown::Cancellation;

pub struct Components {
    pub storage: Storage,
    pub tokens: Arc<TokenService>,
    pub auth: Arc<AuthService>,
    pub limiter: Option<Arc<SlidingWindowRateLimiter>>,
    pub registry: Registry,
    pub metrics: RpcMetrics,
    pub cleanup: Arc<TokenCleanupService>,
    storage_check: Arc<dyn StorageProbe>,
    cancellation: Cancellation,
    config: AppConfig,
}

impl Components {
    pub fn build(config: &AppConfig, storage: Storage) -> Result<Self, DomainError> {
        let revocations = Arc::new(RevocationCache::new());
        let tokens = Arc::new(TokenService::new(
            storage.tokens(),
            storage.users(),
            revocations,
            TokenServiceConfig::from_jwt_config(&config.jwt),
        )?);

        let auth = Arc::new(AuthService::new(
            storage.users(),
            Arc::clone(&tokens),
            Arc::new(BcryptHasher::new(config.jwt.bcrypt_cost)),
            AuthServiceConfig::from(&config.jwt),
        ));

        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(SlidingWindowRateLimiter::from_config(&config.rate_limit)));

        let registry = Registry::new();
        let metrics = RpcMetrics::register(&registry)
            .map_err(|err| DomainError::internal(format!("metrics registration failed: {err}")))?;

        let cleanup = Arc::new(TokenCleanupService::new(
            storage.tokens(),
            TokenCleanupConfig::from(&config.cleanup),
        ));

        info!(
            backend = storage.backend(),
            rate_limit = limiter.is_some(),
            "components initialised"
        );

        Ok(Self {
            storage_check: storage.probe(),
            cancellation: Cancellation::new(),
            storage,
            tokens,
            auth,
            limiter,
            registry,
            metrics,
            cleanup,
            config: config.clone(),
        })
    }

    /// Answer health checks with `check` instead of pinging the storage backend
    pub fn with_storage_check(mut self, check: Arc<dyn StorageProbe>) -> Self {
        self.storage_check = check;
        self
    }

    /// Make calls still running give up; used once the drain grace period is over
    pub fn cancel_in_flight(&self) {
        self.cancellation.cancel();
    }

    /// Stages in execution order; rate limiting is left out when disabled
    pub fn pipeline(&self) -> Pipeline {
        let recovery = RecoveryMiddleware::new(self.config.server.request_timeout())
            .with_cancellation(self.cancellation.listener());
        let mut stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(recovery),
            Arc::new(SecurityMiddleware::new(self.tokens.clone())),
            Arc::new(MetricsMiddleware::new(self.metrics.clone())),
        ];
        if let Some(limiter) = &self.limiter {
            stages.push(Arc::new(RateLimitMiddleware::new(limiter.clone())));
        }
        stages.push(Arc::new(AccessLogMiddleware));

        Pipeline::new(stages)
    }

    pub fn auth_rpc(&self) -> AuthRpc {
        AuthRpc::new(Arc::clone(&self.auth))
    }

    pub fn health_rpc(&self) -> HealthRpc {
        let health = &self.config.server.health;
        HealthRpc::new(
            Arc::clone(&self.storage_check),
            health.probe_timeout(),
            health.watch_interval(),
        )
        .with_cancellation(self.cancellation.listener())
    }

    /// Periodic jobs owned by the process: token cleanup and, when
    /// configured, the idle rate-limit bucket sweep
    pub fn start_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if let Some(handle) = Arc::clone(&self.cleanup).start_background_task() {
            handles.push(handle);
        }

        let sweep_seconds = self.config.rate_limit.idle_sweep_seconds;
        if let (Some(limiter), true) = (&self.limiter, sweep_seconds > 0) {
            handles.push(
                Arc::clone(limiter).start_idle_sweep(std::time::Duration::from_secs(sweep_seconds)),
            );
        }

        handles
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.jwt.access_secret = "access-secret-for-tests".into();
        config.jwt.refresh_secret = "refresh-secret-for-tests".into();
        config.jwt.bcrypt_cost = 4;
        config
    }

    #[tokio::test]
    async fn test_pipeline_order() {
        let components = Components::build(&config(), Storage::in_memory()).unwrap();
        let names = components.pipeline().stage_names();
        let expected = if components.limiter.is_some() {
            vec!["recovery", "security", "metrics", "rate_limit", "access_log"]
        } else {
            vec!["recovery", "security", "metrics", "access_log"]
        };
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_rate_limit_stage_omitted_when_disabled() {
        let mut config = config();
        config.rate_limit.enabled = false;
        let components = Components::build(&config, Storage::in_memory()).unwrap();
        assert!(!components.pipeline().stage_names().contains(&"rate_limit"));
    }

    #[tokio::test]
    async fn test_shared_secrets_are_rejected() {
        let mut config = config();
        config.jwt.refresh_secret = config.jwt.access_secret.clone();
        assert!(Components::build(&config, Storage::in_memory()).is_err());
    }
}
