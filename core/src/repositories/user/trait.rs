//! User repository trait defining the interface for account persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entities::user::User;
use crate::errors::DomainError;

/// Repository trait for User entity persistence operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user
    ///
    /// # Returns
    /// * `Ok(User)` - The stored user
    /// * `Err(DomainError::Conflict)` - The email is already registered
    async fn create(&self, user: User) -> Result<User, DomainError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError>;

    /// Find a user by normalised email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Page through users ordered by creation time
    ///
    /// # Arguments
    /// * `offset` - Rows to skip
    /// * `limit` - Maximum rows to return
    ///
    /// # Returns
    /// * `Ok((users, total))` - The page and the total number of users
    async fn list(&self, offset: u64, limit: u32) -> Result<(Vec<User>, u64), DomainError>;

    /// Replace a stored user
    ///
    /// # Returns
    /// * `Err(DomainError::NotFound)` - No user with this id
    async fn update(&self, user: User) -> Result<User, DomainError>;

    /// Delete a user
    ///
    /// # Returns
    /// * `Ok(true)` - User deleted
    /// * `Ok(false)` - No user with this id
    async fn delete(&self, id: Uuid) -> Result<bool, DomainError>;
}
