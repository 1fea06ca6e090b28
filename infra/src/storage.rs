//! Storage backend selection
//!
//! `DATABASE_URL` decides between the in-process repositories and MySQL.
//! Everything above this module only sees the repository contracts.

use std::sync::Arc;

use ag_core::errors::DomainError;
use ag_core::repositories::{
    InMemoryTokenRepository, InMemoryUserRepository, StorageProbe, TokenRepository,
    UserRepository,
};
use ag_shared::config::DatabaseConfig;
use async_trait::async_trait;

use crate::database::{DatabasePool, MySqlTokenRepository, MySqlUserRepository};
use crate::InfrastructureError;

/// The repositories of one backend, plus what is needed to probe and close it
pub enum Storage {
    Memory {
        users: Arc<InMemoryUserRepository>,
        tokens: Arc<InMemoryTokenRepository>,
    },
    MySql {
        pool: DatabasePool,
        users: Arc<MySqlUserRepository>,
        tokens: Arc<MySqlTokenRepository>,
    },
}

impl Storage {
    /// Opens the backend named by `config`
    ///
    /// For MySQL this connects the pool and, when configured, creates
    /// missing tables.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, InfrastructureError> {
        if config.is_in_memory() {
            tracing::warn!("No database configured, using in-memory storage; state is lost on exit");
            return Ok(Self::in_memory());
        }

        let pool = DatabasePool::new(config).await?;
        if config.ensure_schema {
            pool.ensure_schema().await?;
        }

        Ok(Self::MySql {
            users: Arc::new(MySqlUserRepository::new(pool.get_pool().clone())),
            tokens: Arc::new(MySqlTokenRepository::new(pool.get_pool().clone())),
            pool,
        })
    }

    pub fn in_memory() -> Self {
        Self::Memory {
            users: Arc::new(InMemoryUserRepository::new()),
            tokens: Arc::new(InMemoryTokenRepository::new()),
        }
    }

    pub fn users(&self) -> Arc<dyn UserRepository> {
        match self {
            Self::Memory { users, .. } => users.clone(),
            Self::MySql { users, .. } => users.clone(),
        }
    }

    pub fn tokens(&self) -> Arc<dyn TokenRepository> {
        match self {
            Self::Memory { tokens, .. } => tokens.clone(),
            Self::MySql { tokens, .. } => tokens.clone(),
        }
    }

    /// Reachability check used by the health service
    pub fn probe(&self) -> Arc<dyn StorageProbe> {
        match self {
            Self::Memory { .. } => Arc::new(MemoryProbe),
            Self::MySql { pool, .. } => Arc::new(pool.clone()),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::MySql { .. } => "mysql",
        }
    }

    /// Releases connections. A no-op for the in-memory backend.
    pub async fn close(&self) {
        if let Self::MySql { pool, .. } = self {
            pool.close().await;
        }
    }
}

/// In-process storage is reachable for as long as the process runs
struct MemoryProbe;

#[async_trait]
impl StorageProbe for MemoryProbe {
    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
