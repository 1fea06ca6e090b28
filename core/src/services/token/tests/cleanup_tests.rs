use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::entities::token::Token;
use crate::errors::DomainError;
use crate::repositories::{InMemoryTokenRepository, TokenRepository};
use crate::services::token::{TokenCleanupConfig, TokenCleanupService};

struct FailingRepository;

#[async_trait]
impl TokenRepository for FailingRepository {
    async fn create(&self, token: Token) -> Result<Token, DomainError> {
        Ok(token)
    }

    async fn get_by_access_token(&self, _: &str) -> Result<Option<Token>, DomainError> {
        Ok(None)
    }

    async fn get_by_refresh_token(&self, _: &str) -> Result<Option<Token>, DomainError> {
        Ok(None)
    }

    async fn update_access_token(
        &self,
        _: Uuid,
        _: &str,
        _: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        Ok(false)
    }

    async fn revoke(&self, _: &str) -> Result<bool, DomainError> {
        Ok(false)
    }

    async fn cleanup_expired(&self) -> Result<u64, DomainError> {
        Err(DomainError::Unavailable {
            message: "storage offline".to_string(),
        })
    }
}

#[tokio::test]
async fn test_cleanup_deletes_expired_rows() {
    let repo = Arc::new(InMemoryTokenRepository::new());
    let past = Utc::now() - Duration::days(10);
    repo.create(Token::new(
        Uuid::new_v4(),
        "a".into(),
        "r".into(),
        past,
        past + Duration::days(1),
    ))
    .await
    .unwrap();

    let service = TokenCleanupService::new(repo.clone(), TokenCleanupConfig::default());
    let result = service.run_cleanup().await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.expired_tokens_deleted, 1);
    assert!(repo.is_empty().await);
}

#[tokio::test]
async fn test_cleanup_failure_is_recorded_not_raised() {
    let service = TokenCleanupService::new(Arc::new(FailingRepository), TokenCleanupConfig::default());
    let result = service.run_cleanup().await.unwrap();

    assert!(!result.is_success());
    assert_eq!(result.expired_tokens_deleted, 0);
}

#[tokio::test]
async fn test_disabled_cleanup_does_nothing() {
    let config = TokenCleanupConfig {
        enabled: false,
        ..Default::default()
    };
    let service = Arc::new(TokenCleanupService::new(Arc::new(FailingRepository), config));

    assert!(service.run_cleanup().await.unwrap().is_success());
    assert!(service.start_background_task().is_none());
}
