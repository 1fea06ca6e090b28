//! Main authentication service implementation

use std::sync::Arc;

use ag_shared::types::Pagination;
use tracing::{debug, info, warn};

use crate::domain::entities::token::{AuthContext, TokenPair};
use crate::domain::entities::user::{normalize_email, User};
use crate::errors::{AuthError, DomainError};
use crate::repositories::UserRepository;
use crate::services::token::TokenService;

use super::config::AuthServiceConfig;
use super::inputs::{check, SignInInput, SignUpInput};
use super::password::PasswordHasher;

/// A signed-in user together with the tokens just issued for them
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub tokens: TokenPair,
}

/// Authentication service for the account-facing flows.
///
/// Token state is owned by [`TokenService`]; this service adds credential
/// checks in front of issuance and passes the other token operations through.
pub struct AuthService {
    /// Credential store
    users: Arc<dyn UserRepository>,
    /// Token lifecycle
    tokens: Arc<TokenService>,
    hasher: Arc<dyn PasswordHasher>,
    config: AuthServiceConfig,
}

impl AuthService {
    /// Create a new authentication service
    ///
    /// # Arguments
    ///
    /// * `users` - Repository for user data persistence
    /// * `tokens` - Service for JWT token management
    /// * `hasher` - Password hashing implementation
    /// * `config` - Service configuration
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        hasher: Arc<dyn PasswordHasher>,
        config: AuthServiceConfig,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            config,
        }
    }

    pub fn token_service(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Register a new account and issue its first token pair
    ///
    /// # Returns
    ///
    /// * `Ok(AuthSession)` - The created user and its tokens
    /// * `Err(DomainError::Validation)` - Malformed name, email or password
    /// * `Err(DomainError::Auth(UserAlreadyExists))` - Email already registered
    pub async fn sign_up(&self, input: SignUpInput) -> Result<AuthSession, DomainError> {
        if !self.config.allow_registration {
            return Err(DomainError::Authorization {
                message: "registration is disabled".to_string(),
            });
        }
        check(&input)?;

        let email = normalize_email(&input.email);
        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists.into());
        }

        let password_hash = self.hash_password(input.password).await?;
        // The repository still rejects a duplicate that raced past the lookup above
        let user = self
            .users
            .create(User::new(input.name.trim().to_string(), email, password_hash))
            .await?;
        let tokens = self.tokens.issue(&user).await?;

        info!(user_id = %user.id, "User registered");
        Ok(AuthSession { user, tokens })
    }

    /// Authenticate with email and password
    ///
    /// Unknown email and wrong password fail identically with
    /// `AuthError::InvalidCredentials`, and no tokens are issued.
    pub async fn sign_in(&self, input: SignInInput) -> Result<AuthSession, DomainError> {
        check(&input).map_err(|_| AuthError::InvalidCredentials)?;

        let Some(user) = self.users.get_by_email(&input.email).await? else {
            debug!("Sign-in for unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !self
            .verify_password(input.password, user.password_hash.clone())
            .await?
        {
            warn!(user_id = %user.id, "Sign-in with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.tokens.issue(&user).await?;
        info!(user_id = %user.id, "User signed in");
        Ok(AuthSession { user, tokens })
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), DomainError> {
        self.tokens.sign_out(access_token).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, DomainError> {
        self.tokens.refresh(refresh_token).await
    }

    pub async fn revoke(&self, access_token: &str) -> Result<(), DomainError> {
        self.tokens.revoke(access_token).await
    }

    pub async fn validate(&self, access_token: &str) -> Result<AuthContext, DomainError> {
        self.tokens.validate(access_token).await
    }

    /// One page of users plus the total count
    pub async fn list_users(&self, page: Pagination) -> Result<(Vec<User>, u64), DomainError> {
        self.users.list(page.offset(), page.limit).await
    }

    async fn hash_password(&self, password: String) -> Result<String, DomainError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| DomainError::internal(format!("password hashing task failed: {e}")))?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, DomainError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| DomainError::internal(format!("password check task failed: {e}")))?
    }
}
