//! Main token service implementation

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, info, warn};

use crate::domain::entities::token::{AuthContext, Claims, Token, TokenPair, TokenType};
use crate::domain::entities::user::User;
use crate::errors::{AuthError, DomainError, TokenError};
use crate::repositories::{TokenRepository, UserRepository};

use super::config::TokenServiceConfig;
use super::revocation::{token_fingerprint, RevocationCache};

/// Whether decoding enforces `exp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    Enforced,
    Ignored,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// The authority on token state.
///
/// Revocation is checked in two tiers: the in-process [`RevocationCache`]
/// rejects quickly, and the token repository decides. Both tiers stay; the
/// cache cannot see revocations made by other processes or before a restart.
pub struct TokenService {
    tokens: Arc<dyn TokenRepository>,
    users: Arc<dyn UserRepository>,
    revocations: Arc<RevocationCache>,
    config: TokenServiceConfig,
    access_keys: SigningKeys,
    refresh_keys: SigningKeys,
    strict: Validation,
    lenient: Validation,
}

impl TokenService {
    /// Creates a new token service instance
    ///
    /// # Arguments
    ///
    /// * `tokens` - Durable store of issued tokens
    /// * `users` - Credential store, read to re-issue access tokens
    /// * `revocations` - Fast-reject cache shared with nothing outside this process
    /// * `config` - Token service configuration
    ///
    /// # Returns
    ///
    /// A new `TokenService`, or an error if the configuration is unusable
    pub fn new(
        tokens: Arc<dyn TokenRepository>,
        users: Arc<dyn UserRepository>,
        revocations: Arc<RevocationCache>,
        config: TokenServiceConfig,
    ) -> Result<Self, DomainError> {
        config.validate()?;

        let mut strict = Validation::new(Algorithm::HS256);
        strict.set_issuer(&[config.issuer.as_str()]);
        strict.set_required_spec_claims(&["exp", "iss"]);
        strict.leeway = config.leeway;
        strict.validate_exp = true;

        let mut lenient = strict.clone();
        lenient.validate_exp = false;

        Ok(Self {
            tokens,
            users,
            revocations,
            access_keys: SigningKeys::from_secret(&config.access_secret),
            refresh_keys: SigningKeys::from_secret(&config.refresh_secret),
            config,
            strict,
            lenient,
        })
    }

    pub fn config(&self) -> &TokenServiceConfig {
        &self.config
    }

    pub fn revocations(&self) -> &Arc<RevocationCache> {
        &self.revocations
    }

    /// Issues an access/refresh pair for `user` and persists one token row
    ///
    /// # Returns
    ///
    /// * `Ok(TokenPair)` - Both tokens with their expiry instants
    /// * `Err(DomainError)` - Signing or storage failed
    pub async fn issue(&self, user: &User) -> Result<TokenPair, DomainError> {
        let issued_at = Utc::now();
        let access_claims = Claims::new(
            user,
            TokenType::Access,
            issued_at,
            self.config.access_token_ttl,
            &self.config.issuer,
        );
        let refresh_claims = Claims::new(
            user,
            TokenType::Refresh,
            issued_at,
            self.config.refresh_token_ttl,
            &self.config.issuer,
        );

        let row = Token::new(
            user.id,
            self.encode(&access_claims)?,
            self.encode(&refresh_claims)?,
            issued_at + self.config.access_token_ttl,
            issued_at + self.config.refresh_token_ttl,
        );
        let row = self.tokens.create(row).await?;

        debug!(user_id = %user.id, token_id = %row.id, "Issued token pair");
        Ok(TokenPair::from_row(&row))
    }

    /// Validates an access token
    ///
    /// Signature, expiry and `type == access` are checked first, then the
    /// revocation cache, then the stored row. A correctly signed token that was
    /// never issued, or was revoked elsewhere, fails on the stored row.
    ///
    /// # Returns
    ///
    /// * `Ok(AuthContext)` - The owning user's identity
    /// * `Err(DomainError::Token)` - Empty, malformed, wrongly signed, wrong type,
    ///   expired, revoked or unknown token
    pub async fn validate(&self, access_token: &str) -> Result<AuthContext, DomainError> {
        let claims = self.decode(access_token, TokenType::Access, Expiry::Enforced)?;

        if self.revocations.check(access_token) {
            return Err(TokenError::TokenRevoked.into());
        }

        let row = self
            .tokens
            .get_by_access_token(access_token)
            .await?
            .ok_or(TokenError::TokenNotFound)?;

        if row.is_revoked {
            // Revoked through the durable store, possibly by another process
            self.revocations.add(access_token);
            return Err(TokenError::TokenRevoked.into());
        }

        let user_id = claims
            .parsed_user_id()
            .map_err(|_| TokenError::InvalidTokenFormat)?;
        if row.user_id != user_id {
            warn!(token_id = %row.id, "Access token claims do not match stored owner");
            return Err(TokenError::InvalidTokenFormat.into());
        }

        Ok(AuthContext {
            user_id,
            name: claims.name,
            email: claims.email,
            token_id: row.id,
        })
    }

    /// Exchanges a refresh token for a new access token
    ///
    /// Only the access fields of the stored row change. The refresh token and
    /// its expiry are returned unchanged.
    ///
    /// # Returns
    ///
    /// * `Ok(TokenPair)` - New access token plus the unchanged refresh token
    /// * `Err(DomainError)` - Invalid, revoked or expired refresh token, or the
    ///   owning user no longer exists
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, DomainError> {
        let claims = self.decode(refresh_token, TokenType::Refresh, Expiry::Enforced)?;

        let row = self
            .tokens
            .get_by_refresh_token(refresh_token)
            .await?
            .ok_or(TokenError::TokenNotFound)?;

        if row.is_revoked {
            return Err(TokenError::TokenRevoked.into());
        }
        if row.is_refresh_expired() {
            return Err(TokenError::RefreshTokenExpired.into());
        }

        let user_id = claims
            .parsed_user_id()
            .map_err(|_| TokenError::InvalidTokenFormat)?;
        if row.user_id != user_id {
            return Err(TokenError::InvalidTokenFormat.into());
        }

        let user = self
            .users
            .get_by_id(row.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // The new access token must still expire before its refresh token
        let issued_at = Utc::now();
        let remaining = row.refresh_expires_at - issued_at - Duration::seconds(1);
        let lifetime = self.config.access_token_ttl.min(remaining);
        if lifetime <= Duration::zero() {
            return Err(TokenError::RefreshTokenExpired.into());
        }

        let access_claims = Claims::new(
            &user,
            TokenType::Access,
            issued_at,
            lifetime,
            &self.config.issuer,
        );
        let access_token = self.encode(&access_claims)?;
        let access_expires_at = issued_at + lifetime;

        let updated = self
            .tokens
            .update_access_token(row.id, &access_token, access_expires_at)
            .await?;
        if !updated {
            // Removed by cleanup between the read and the write
            return Err(TokenError::TokenNotFound.into());
        }

        debug!(user_id = %user.id, token_id = %row.id, "Refreshed access token");
        Ok(TokenPair::new(
            access_token,
            row.refresh_token,
            access_expires_at,
            row.refresh_expires_at,
        ))
    }

    /// Revokes an access token in the revocation cache and the stored row
    ///
    /// The token must be correctly signed and unexpired. Revoking a token
    /// that is already revoked, or that has no stored row, succeeds. A revoked
    /// row also refuses Refresh.
    pub async fn revoke(&self, access_token: &str) -> Result<(), DomainError> {
        self.decode(access_token, TokenType::Access, Expiry::Enforced)?;

        // Cache first, so validations racing with the durable write already reject
        self.revocations.add(access_token);

        let matched = self.tokens.revoke(access_token).await?;
        info!(
            token = %token_fingerprint(access_token),
            stored = matched,
            "Access token revoked"
        );
        Ok(())
    }

    /// Ends a session by rejecting its access token from now on
    ///
    /// Unlike [`revoke`](Self::revoke), expired tokens are accepted so a stale
    /// session can still log out, while garbage is rejected. Sign-out only
    /// marks the access token in the revocation cache and leaves the stored
    /// row alone, so the paired refresh token keeps working until it is
    /// revoked separately.
    ///
    /// The mark lives only in this process. After a restart the signed-out
    /// access token validates again until it expires; use
    /// [`revoke`](Self::revoke) when the rejection has to be durable.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), DomainError> {
        self.decode(access_token, TokenType::Access, Expiry::Ignored)?;
        self.revocations.add(access_token);
        info!(token = %token_fingerprint(access_token), "Session signed out");
        Ok(())
    }

    /// Deletes rows whose refresh token has expired
    pub async fn cleanup_expired(&self) -> Result<u64, DomainError> {
        self.tokens.cleanup_expired().await
    }

    /// Signs `claims` with the key of their tier
    pub(crate) fn encode(&self, claims: &Claims) -> Result<String, DomainError> {
        let keys = self.keys(claims.token_type);
        encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
            .map_err(|_| DomainError::Token(TokenError::TokenGenerationFailed))
    }

    fn decode(&self, token: &str, expected: TokenType, expiry: Expiry) -> Result<Claims, DomainError> {
        if token.trim().is_empty() {
            return Err(TokenError::EmptyToken.into());
        }

        let validation = match expiry {
            Expiry::Enforced => &self.strict,
            Expiry::Ignored => &self.lenient,
        };

        let claims = decode::<Claims>(token, &self.keys(expected).decoding, validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => DomainError::Token(TokenError::TokenExpired),
                JwtErrorKind::InvalidSignature => DomainError::Token(TokenError::InvalidSignature),
                _ => DomainError::Token(TokenError::InvalidTokenFormat),
            })?
            .claims;

        if claims.token_type != expected {
            return Err(TokenError::WrongTokenType.into());
        }
        Ok(claims)
    }

    fn keys(&self, token_type: TokenType) -> &SigningKeys {
        match token_type {
            TokenType::Access => &self.access_keys,
            TokenType::Refresh => &self.refresh_keys,
        }
    }
}
