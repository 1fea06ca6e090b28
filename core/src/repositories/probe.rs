//! Storage reachability contract used by health checks.

use async_trait::async_trait;

use crate::errors::DomainError;

/// Answers whether the backing store is reachable right now.
///
/// Callers apply their own timeout; implementations should not retry.
#[async_trait]
pub trait StorageProbe: Send + Sync {
    async fn ping(&self) -> Result<(), DomainError>;

    /// Short name of the backend for logs and health output
    fn backend(&self) -> &'static str;
}
