//! Shared setup for authentication service tests

use std::sync::Arc;

use chrono::Duration;

use crate::domain::entities::token::JWT_ISSUER;
use crate::repositories::{InMemoryTokenRepository, InMemoryUserRepository};
use crate::services::auth::{AuthService, AuthServiceConfig, BcryptHasher, MIN_BCRYPT_COST};
use crate::services::token::{RevocationCache, TokenService, TokenServiceConfig};

pub struct TestContext {
    pub auth: AuthService,
    pub tokens: Arc<InMemoryTokenRepository>,
    pub users: Arc<InMemoryUserRepository>,
}

pub fn token_config() -> TokenServiceConfig {
    TokenServiceConfig {
        access_secret: "auth-tests-access".to_string(),
        refresh_secret: "auth-tests-refresh".to_string(),
        access_token_ttl: Duration::minutes(15),
        refresh_token_ttl: Duration::days(7),
        issuer: JWT_ISSUER.to_string(),
        leeway: 0,
    }
}

pub fn context() -> TestContext {
    context_with(AuthServiceConfig {
        bcrypt_cost: MIN_BCRYPT_COST,
        ..Default::default()
    })
}

pub fn context_with(config: AuthServiceConfig) -> TestContext {
    let tokens = Arc::new(InMemoryTokenRepository::new());
    let users = Arc::new(InMemoryUserRepository::new());
    let token_service = TokenService::new(
        tokens.clone(),
        users.clone(),
        Arc::new(RevocationCache::new()),
        token_config(),
    )
    .unwrap();

    let auth = AuthService::new(
        users.clone(),
        Arc::new(token_service),
        Arc::new(BcryptHasher::new(config.bcrypt_cost)),
        config,
    );

    TestContext { auth, tokens, users }
}
