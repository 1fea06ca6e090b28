//! # Infrastructure Layer
//!
//! Concrete storage for authgate:
//! - **Database**: MySQL pool and repository implementations using SQLx
//! - **Storage**: selects the in-memory or MySQL backend from configuration

pub mod database;
pub mod error;
pub mod storage;

pub use database::{DatabasePool, MySqlTokenRepository, MySqlUserRepository, PoolStatistics};
pub use error::InfrastructureError;
pub use storage::Storage;
