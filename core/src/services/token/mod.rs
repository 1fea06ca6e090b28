//! Token service module for JWT management
//!
//! This module handles the token lifecycle:
//! - Issuing access/refresh pairs signed with distinct secrets
//! - Validating access tokens against the revocation cache and the durable store
//! - Refreshing access tokens in place (the refresh token is not rotated)
//! - Revocation and sign-out
//! - Background cleanup of expired rows

mod cleanup;
mod config;
mod revocation;
mod service;

#[cfg(test)]
mod tests;

pub use cleanup::{CleanupResult, TokenCleanupConfig, TokenCleanupService};
pub use config::TokenServiceConfig;
pub use revocation::{token_fingerprint, RevocationCache};
pub use service::TokenService;
