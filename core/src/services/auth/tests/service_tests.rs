//! Unit tests for authentication service

use ag_shared::types::Pagination;

use crate::errors::{AuthError, DomainError, ErrorKind, TokenError};
use crate::repositories::{TokenRepository, UserRepository};
use crate::services::auth::{AuthServiceConfig, SignInInput, SignUpInput, MIN_BCRYPT_COST};

use super::fixtures::{context, context_with};

fn ana() -> SignUpInput {
    SignUpInput::new("Ana", "ana@x.com", "Secret123!")
}

#[tokio::test]
async fn test_ana_session_lifecycle() {
    let ctx = context();

    let session = ctx.auth.sign_up(ana()).await.unwrap();
    let identity = ctx.auth.validate(&session.tokens.access_token).await.unwrap();
    assert_eq!(identity.user_id, session.user.id);
    assert_eq!(identity.name, "Ana");

    let wrong = ctx
        .auth
        .sign_in(SignInInput::new("ana@x.com", "wrong-password"))
        .await;
    assert!(matches!(
        wrong,
        Err(DomainError::Auth(AuthError::InvalidCredentials))
    ));

    ctx.auth.sign_out(&session.tokens.access_token).await.unwrap();
    let after_sign_out = ctx.auth.validate(&session.tokens.access_token).await;
    assert_eq!(after_sign_out.unwrap_err().kind(), ErrorKind::Authentication);

    // Sign-out leaves the refresh side alone
    let refreshed = ctx.auth.refresh(&session.tokens.refresh_token).await.unwrap();
    assert_eq!(
        ctx.auth.validate(&refreshed.access_token).await.unwrap().user_id,
        session.user.id
    );

    ctx.auth.revoke(&refreshed.access_token).await.unwrap();
    let after_revoke = ctx.auth.refresh(&session.tokens.refresh_token).await;
    assert!(matches!(
        after_revoke,
        Err(DomainError::Token(TokenError::TokenRevoked))
    ));
}

#[tokio::test]
async fn test_sign_up_stores_hash_not_password() {
    let ctx = context();
    let session = ctx.auth.sign_up(ana()).await.unwrap();

    let stored = ctx.users.get_by_id(session.user.id).await.unwrap().unwrap();
    assert_ne!(stored.password_hash, "Secret123!");
    assert!(bcrypt::verify("Secret123!", &stored.password_hash).unwrap());

    let row = ctx
        .tokens
        .get_by_access_token(&session.tokens.access_token)
        .await
        .unwrap();
    assert!(row.is_some());
}

#[tokio::test]
async fn test_sign_up_normalises_email() {
    let ctx = context();
    let session = ctx
        .auth
        .sign_up(SignUpInput::new("Ana", "  Ana@X.com ", "Secret123!"))
        .await
        .unwrap();
    assert_eq!(session.user.email, "ana@x.com");

    ctx.auth
        .sign_in(SignInInput::new("ANA@x.com", "Secret123!"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sign_up_rejects_duplicate_email() {
    let ctx = context();
    ctx.auth.sign_up(ana()).await.unwrap();

    let duplicate = ctx
        .auth
        .sign_up(SignUpInput::new("Other Ana", "ANA@x.com", "Another123!"))
        .await;
    assert_eq!(duplicate.unwrap_err().kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_sign_up_rejects_malformed_input() {
    let ctx = context();
    let result = ctx
        .auth
        .sign_up(SignUpInput::new("Ana", "not-an-email", "Secret123!"))
        .await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);

    let result = ctx
        .auth
        .sign_up(SignUpInput::new("Ana", "ana@x.com", "short"))
        .await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    assert!(ctx.users.is_empty().await);
}

#[tokio::test]
async fn test_sign_up_disabled() {
    let ctx = context_with(AuthServiceConfig {
        allow_registration: false,
        bcrypt_cost: MIN_BCRYPT_COST,
    });
    let result = ctx.auth.sign_up(ana()).await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Authorization);
}

#[tokio::test]
async fn test_sign_in_unknown_email_matches_wrong_password() {
    let ctx = context();
    ctx.auth.sign_up(ana()).await.unwrap();

    let unknown = ctx
        .auth
        .sign_in(SignInInput::new("bob@x.com", "Secret123!"))
        .await
        .unwrap_err();
    let wrong = ctx
        .auth
        .sign_in(SignInInput::new("ana@x.com", "Secret124!"))
        .await
        .unwrap_err();

    assert_eq!(unknown.to_string(), wrong.to_string());
    assert_eq!(unknown.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn test_sign_in_issues_fresh_pair() {
    let ctx = context();
    let first = ctx.auth.sign_up(ana()).await.unwrap();
    let second = ctx
        .auth
        .sign_in(SignInInput::new("ana@x.com", "Secret123!"))
        .await
        .unwrap();

    assert_ne!(first.tokens.access_token, second.tokens.access_token);
    assert_eq!(second.user.id, first.user.id);
    assert_eq!(ctx.tokens.len().await, 2);
}

#[tokio::test]
async fn test_list_users_pages() {
    let ctx = context();
    for i in 0..5 {
        ctx.auth
            .sign_up(SignUpInput::new(format!("User {i}"), format!("user{i}@x.com"), "Secret123!"))
            .await
            .unwrap();
    }

    let (first, total) = ctx.auth.list_users(Pagination::new(1, 2)).await.unwrap();
    assert_eq!(total, 5);
    assert_eq!(first.len(), 2);

    let (last, _) = ctx.auth.list_users(Pagination::new(3, 2)).await.unwrap();
    assert_eq!(last.len(), 1);

    let (beyond, total) = ctx.auth.list_users(Pagination::new(9, 2)).await.unwrap();
    assert!(beyond.is_empty());
    assert_eq!(total, 5);
}
