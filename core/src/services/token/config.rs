//! Configuration for the token service

use ag_shared::config::JwtConfig;
use chrono::Duration;

use crate::domain::entities::token::JWT_ISSUER;
use crate::errors::DomainError;

/// Configuration for the token service
#[derive(Debug, Clone)]
pub struct TokenServiceConfig {
    /// Secret signing access tokens
    pub access_secret: String,
    /// Secret signing refresh tokens
    pub refresh_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub issuer: String,
    /// Seconds of clock skew tolerated on `exp`
    pub leeway: u64,
}

impl Default for TokenServiceConfig {
    fn default() -> Self {
        Self {
            access_secret: "development-access-secret".to_string(),
            refresh_secret: "development-refresh-secret".to_string(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            issuer: JWT_ISSUER.to_string(),
            leeway: 0,
        }
    }
}

impl TokenServiceConfig {
    pub fn from_jwt_config(jwt: &JwtConfig) -> Self {
        Self {
            access_secret: jwt.access_secret.clone(),
            refresh_secret: jwt.refresh_secret.clone(),
            access_token_ttl: Duration::seconds(jwt.access_token_expiry),
            refresh_token_ttl: Duration::seconds(jwt.refresh_token_expiry),
            issuer: jwt.issuer.clone(),
            leeway: jwt.leeway,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(DomainError::internal("token signing secrets must not be empty"));
        }
        if self.access_secret == self.refresh_secret {
            return Err(DomainError::internal(
                "access and refresh tokens must be signed with distinct secrets",
            ));
        }
        if self.access_token_ttl <= Duration::zero() {
            return Err(DomainError::internal("access token lifetime must be positive"));
        }
        if self.refresh_token_ttl <= self.access_token_ttl {
            return Err(DomainError::internal(
                "refresh token lifetime must exceed access token lifetime",
            ));
        }
        Ok(())
    }
}
