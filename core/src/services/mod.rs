//! Business services containing domain logic and use cases.

pub mod auth;
pub mod rate_limit;
pub mod token;

// Re-export commonly used types
pub use auth::{AuthService, AuthServiceConfig, AuthSession, BcryptHasher, PasswordHasher, SignInInput, SignUpInput};
pub use rate_limit::{RateLimiter, SlidingWindowRateLimiter, UNKNOWN_CLIENT};
pub use token::{
    RevocationCache, TokenCleanupConfig, TokenCleanupService, TokenService, TokenServiceConfig,
};
