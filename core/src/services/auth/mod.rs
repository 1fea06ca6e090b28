//! Authentication service module
//!
//! Account registration and password sign-in on top of the token service:
//! - Input validation and email normalisation
//! - Password hashing on the blocking pool
//! - Token issuance, refresh, revocation and sign-out
//! - User listing for protected callers

mod config;
mod inputs;
mod password;
mod service;

#[cfg(test)]
mod tests;

pub use config::AuthServiceConfig;
pub use inputs::{SignInInput, SignUpInput};
pub use password::{BcryptHasher, PasswordHasher, MAX_BCRYPT_COST, MIN_BCRYPT_COST};
pub use service::{AuthService, AuthSession};
