//! # authgate core
//!
//! Domain layer for the authgate service: entities, the error taxonomy,
//! repository contracts with in-memory implementations, and the token,
//! authentication and rate limiting services.

pub mod domain;
pub mod errors;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::{AuthContext, Claims, Token, TokenPair, TokenType, User};
pub use errors::{AuthError, DomainError, DomainResult, ErrorKind, TokenError};
pub use repositories::{StorageProbe, TokenRepository, UserRepository};
pub use services::{AuthService, RateLimiter, RevocationCache, TokenService};
