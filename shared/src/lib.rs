//! Shared configuration and common types for the authgate server
//!
//! This crate provides functionality used across all server crates:
//! - Configuration types loaded from the environment
//! - The JSON error body returned by the HTTP gateway
//! - Pagination parameters for list endpoints

pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items at crate root
pub use config::{
    AppConfig, CleanupConfig, CorsConfig, DatabaseConfig, Environment, HealthConfig, JwtConfig,
    LogFormat, LoggingConfig, RateLimitConfig, ServerConfig, TlsConfig, TlsVersion,
};
pub use errors::{error_codes, ErrorResponse};
pub use types::Pagination;
