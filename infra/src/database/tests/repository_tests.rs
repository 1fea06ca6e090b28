//! Repository tests against a live MySQL instance

use chrono::{Duration, Utc};
use uuid::Uuid;

use ag_core::domain::entities::{Token, User};
use ag_core::errors::{DomainError, ErrorKind};
use ag_core::repositories::{TokenRepository, UserRepository};

use super::connection_tests::test_config;
use crate::database::{DatabasePool, MySqlTokenRepository, MySqlUserRepository};

async fn repositories() -> (MySqlUserRepository, MySqlTokenRepository) {
    let pool = DatabasePool::new(&test_config()).await.unwrap();
    pool.ensure_schema().await.unwrap();
    (
        MySqlUserRepository::new(pool.get_pool().clone()),
        MySqlTokenRepository::new(pool.get_pool().clone()),
    )
}

fn unique_user() -> User {
    User::new(
        "Ana".to_string(),
        format!("ana+{}@x.com", Uuid::new_v4()),
        "hash".to_string(),
    )
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_user_round_trip_and_duplicate_email() {
    let (users, _) = repositories().await;
    let user = users.create(unique_user()).await.unwrap();

    let found = users.get_by_email(&user.email.to_uppercase()).await.unwrap().unwrap();
    assert_eq!(found.id, user.id);

    let mut duplicate = unique_user();
    duplicate.email = user.email.clone();
    let err = users.create(duplicate).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert!(users.delete(user.id).await.unwrap());
    assert!(users.get_by_id(user.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_update_missing_user_is_not_found() {
    let (users, _) = repositories().await;
    let err = users.update(unique_user()).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_token_lifecycle() {
    let (_, tokens) = repositories().await;
    let now = Utc::now();
    let access = format!("access-{}", Uuid::new_v4());
    let refresh = format!("refresh-{}", Uuid::new_v4());
    let row = tokens
        .create(Token::new(
            Uuid::new_v4(),
            access.clone(),
            refresh.clone(),
            now + Duration::minutes(15),
            now + Duration::days(7),
        ))
        .await
        .unwrap();

    let by_refresh = tokens.get_by_refresh_token(&refresh).await.unwrap().unwrap();
    assert_eq!(by_refresh.id, row.id);

    let replacement = format!("access-{}", Uuid::new_v4());
    assert!(tokens
        .update_access_token(row.id, &replacement, now + Duration::minutes(30))
        .await
        .unwrap());
    assert!(tokens.get_by_access_token(&access).await.unwrap().is_none());

    assert!(tokens.revoke(&replacement).await.unwrap());
    assert!(tokens.revoke(&replacement).await.unwrap());
    assert!(!tokens.revoke("never-issued").await.unwrap());
    let revoked = tokens.get_by_access_token(&replacement).await.unwrap().unwrap();
    assert!(revoked.is_revoked);
}
