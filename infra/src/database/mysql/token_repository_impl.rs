//! MySQL implementation of the TokenRepository trait.
//!
//! Raw token values are stored alongside their SHA-256 digests; every lookup
//! goes through the indexed digest column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

use ag_core::domain::entities::token::Token;
use ag_core::errors::DomainError;
use ag_core::repositories::TokenRepository;

use crate::error::query_failed;

const TOKEN_COLUMNS: &str = "id, user_id, access_token, refresh_token, \
     access_expires_at, refresh_expires_at, is_revoked, created_at";

/// MySQL implementation of TokenRepository
pub struct MySqlTokenRepository {
    /// Database connection pool
    pool: MySqlPool,
}

impl MySqlTokenRepository {
    /// Create a new MySQL token repository
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Hex SHA-256 of a token value, used as its lookup key
    pub fn hash_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// Convert database row to Token entity
    fn row_to_token(row: &sqlx::mysql::MySqlRow) -> Result<Token, DomainError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| DomainError::internal(format!("Failed to get id: {}", e)))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| DomainError::internal(format!("Failed to get user_id: {}", e)))?;

        Ok(Token {
            id: Uuid::parse_str(&id)
                .map_err(|e| DomainError::internal(format!("Invalid token UUID: {}", e)))?,
            user_id: Uuid::parse_str(&user_id)
                .map_err(|e| DomainError::internal(format!("Invalid user UUID: {}", e)))?,
            access_token: row
                .try_get("access_token")
                .map_err(|e| DomainError::internal(format!("Failed to get access_token: {}", e)))?,
            refresh_token: row
                .try_get("refresh_token")
                .map_err(|e| DomainError::internal(format!("Failed to get refresh_token: {}", e)))?,
            access_expires_at: row
                .try_get::<DateTime<Utc>, _>("access_expires_at")
                .map_err(|e| DomainError::internal(format!("Failed to get access_expires_at: {}", e)))?,
            refresh_expires_at: row
                .try_get::<DateTime<Utc>, _>("refresh_expires_at")
                .map_err(|e| DomainError::internal(format!("Failed to get refresh_expires_at: {}", e)))?,
            is_revoked: row
                .try_get("is_revoked")
                .map_err(|e| DomainError::internal(format!("Failed to get is_revoked: {}", e)))?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| DomainError::internal(format!("Failed to get created_at: {}", e)))?,
        })
    }

    async fn find_by(&self, column: &str, token: &str) -> Result<Option<Token>, DomainError> {
        let query = format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE {column} = ? LIMIT 1");

        let row = sqlx::query(&query)
            .bind(Self::hash_token(token))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to find token", e))?;

        row.as_ref().map(Self::row_to_token).transpose()
    }
}

#[async_trait]
impl TokenRepository for MySqlTokenRepository {
    async fn create(&self, token: Token) -> Result<Token, DomainError> {
        let query = r#"
            INSERT INTO tokens (
                id, user_id, access_token, access_token_hash, refresh_token, refresh_token_hash,
                access_expires_at, refresh_expires_at, is_revoked, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(token.id.to_string())
            .bind(token.user_id.to_string())
            .bind(&token.access_token)
            .bind(Self::hash_token(&token.access_token))
            .bind(&token.refresh_token)
            .bind(Self::hash_token(&token.refresh_token))
            .bind(token.access_expires_at)
            .bind(token.refresh_expires_at)
            .bind(token.is_revoked)
            .bind(token.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to save token", e))?;

        Ok(token)
    }

    async fn get_by_access_token(&self, access_token: &str) -> Result<Option<Token>, DomainError> {
        self.find_by("access_token_hash", access_token).await
    }

    async fn get_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Token>, DomainError> {
        self.find_by("refresh_token_hash", refresh_token).await
    }

    async fn update_access_token(
        &self,
        id: Uuid,
        access_token: &str,
        access_expires_at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let query = r#"
            UPDATE tokens
            SET access_token = ?, access_token_hash = ?, access_expires_at = ?
            WHERE id = ?
        "#;

        let result = sqlx::query(query)
            .bind(access_token)
            .bind(Self::hash_token(access_token))
            .bind(access_expires_at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to update access token", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke(&self, access_token: &str) -> Result<bool, DomainError> {
        // An already revoked row still counts as matched
        let result = sqlx::query(
            "UPDATE tokens SET is_revoked = TRUE WHERE access_token_hash = ? AND is_revoked = FALSE",
        )
        .bind(Self::hash_token(access_token))
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to revoke token", e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        Ok(self.get_by_access_token(access_token).await?.is_some())
    }

    async fn cleanup_expired(&self) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM tokens WHERE refresh_expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to cleanup expired tokens", e))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_stable_hex() {
        let a = MySqlTokenRepository::hash_token("header.payload.signature");
        let b = MySqlTokenRepository::hash_token("header.payload.signature");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, MySqlTokenRepository::hash_token("header.payload.other"));
    }
}
