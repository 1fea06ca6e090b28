//! Infrastructure-specific error types

use ag_core::errors::DomainError;

#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl InfrastructureError {
    /// True when the database rejected a write on a unique key
    pub fn is_unique_violation(&self) -> bool {
        match self {
            InfrastructureError::Database(e) => e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation()),
            InfrastructureError::Config(_) => false,
        }
    }

    /// True when the database could not be reached at all
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            InfrastructureError::Database(
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Tls(_)
            )
        )
    }
}

impl From<InfrastructureError> for DomainError {
    fn from(err: InfrastructureError) -> Self {
        if err.is_connectivity() {
            DomainError::Unavailable {
                message: err.to_string(),
            }
        } else if err.is_unique_violation() {
            DomainError::Conflict {
                message: "record already exists".to_string(),
            }
        } else {
            DomainError::internal(err.to_string())
        }
    }
}

/// Converts a failed query into a domain error, keeping what was attempted
pub(crate) fn query_failed(context: &str, err: sqlx::Error) -> DomainError {
    tracing::error!(error = %err, "{context}");
    DomainError::from(InfrastructureError::Database(err))
}
