//! Token repository trait defining the interface for issued-token persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entities::token::Token;
use crate::errors::DomainError;

/// Repository trait for issued token rows
///
/// The durable store is the authority on revocation across every process
/// of a deployment. Rows are only deleted by `cleanup_expired`.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Persist a freshly issued token row
    ///
    /// # Arguments
    /// * `token` - The row to insert
    ///
    /// # Returns
    /// * `Ok(Token)` - The stored row
    /// * `Err(DomainError)` - Insert failed (e.g., duplicate token value)
    async fn create(&self, token: Token) -> Result<Token, DomainError>;

    /// Find a row by its current access token
    ///
    /// # Returns
    /// * `Ok(Some(Token))` - Row found (it may be revoked)
    /// * `Ok(None)` - The token was never issued, or has been replaced by Refresh
    async fn get_by_access_token(&self, access_token: &str) -> Result<Option<Token>, DomainError>;

    /// Find a row by its refresh token
    async fn get_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Token>, DomainError>;

    /// Replace the access token and its expiry of one row in place
    ///
    /// # Arguments
    /// * `id` - Row identifier
    /// * `access_token` - Newly signed access token
    /// * `access_expires_at` - Its expiry
    ///
    /// # Returns
    /// * `Ok(true)` - Row updated
    /// * `Ok(false)` - No such row
    async fn update_access_token(
        &self,
        id: Uuid,
        access_token: &str,
        access_expires_at: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// Mark the row holding `access_token` as revoked
    ///
    /// # Returns
    /// * `Ok(true)` - A row matched (already-revoked rows match too)
    /// * `Ok(false)` - No row holds this access token
    async fn revoke(&self, access_token: &str) -> Result<bool, DomainError>;

    /// Delete rows whose refresh token has expired
    ///
    /// # Returns
    /// * `Ok(u64)` - Number of rows removed
    async fn cleanup_expired(&self) -> Result<u64, DomainError>;
}
