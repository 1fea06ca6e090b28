//! In-process implementation of TokenRepository.
//!
//! Used when no database is configured, and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entities::token::Token;
use crate::errors::DomainError;

use super::r#trait::TokenRepository;

#[derive(Default)]
struct TokenTable {
    rows: HashMap<Uuid, Token>,
    by_access: HashMap<String, Uuid>,
    by_refresh: HashMap<String, Uuid>,
}

/// Token rows held in a map behind an async lock, indexed by both token values
#[derive(Default)]
pub struct InMemoryTokenRepository {
    table: RwLock<TokenTable>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn create(&self, token: Token) -> Result<Token, DomainError> {
        let mut table = self.table.write().await;

        if table.by_access.contains_key(&token.access_token)
            || table.by_refresh.contains_key(&token.refresh_token)
        {
            return Err(DomainError::Conflict {
                message: "Token already exists".to_string(),
            });
        }

        table.by_access.insert(token.access_token.clone(), token.id);
        table.by_refresh.insert(token.refresh_token.clone(), token.id);
        table.rows.insert(token.id, token.clone());
        Ok(token)
    }

    async fn get_by_access_token(&self, access_token: &str) -> Result<Option<Token>, DomainError> {
        let table = self.table.read().await;
        Ok(table
            .by_access
            .get(access_token)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn get_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Token>, DomainError> {
        let table = self.table.read().await;
        Ok(table
            .by_refresh
            .get(refresh_token)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn update_access_token(
        &self,
        id: Uuid,
        access_token: &str,
        access_expires_at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut table = self.table.write().await;
        let TokenTable { rows, by_access, .. } = &mut *table;

        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };
        by_access.remove(&row.access_token);
        row.replace_access(access_token.to_string(), access_expires_at);
        by_access.insert(access_token.to_string(), id);
        Ok(true)
    }

    async fn revoke(&self, access_token: &str) -> Result<bool, DomainError> {
        let mut table = self.table.write().await;
        let TokenTable { rows, by_access, .. } = &mut *table;

        match by_access.get(access_token).and_then(|id| rows.get_mut(id)) {
            Some(row) => {
                row.revoke();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cleanup_expired(&self) -> Result<u64, DomainError> {
        let mut table = self.table.write().await;
        let now = Utc::now();

        let expired: Vec<Token> = table
            .rows
            .values()
            .filter(|row| row.refresh_expires_at <= now)
            .cloned()
            .collect();

        for row in &expired {
            table.rows.remove(&row.id);
            table.by_access.remove(&row.access_token);
            table.by_refresh.remove(&row.refresh_token);
        }

        Ok(expired.len() as u64)
    }
}
