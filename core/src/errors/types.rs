//! Authentication and token error types

use thiserror::Error;

/// Service-wide error taxonomy. Both protocol front ends map from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    RateLimited,
    Internal,
    Unavailable,
    Timeout,
    Canceled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Internal => "internal",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Canceled => "canceled",
        }
    }
}

/// Account-level authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown email or wrong password; deliberately indistinguishable
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing bearer credentials")]
    MissingCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials
            | AuthError::MissingCredentials
            | AuthError::UserNotFound => ErrorKind::Authentication,
            AuthError::UserAlreadyExists => ErrorKind::Conflict,
            AuthError::InsufficientPermissions => ErrorKind::Authorization,
        }
    }
}

/// Token validation and management errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token is empty")]
    EmptyToken,

    #[error("Invalid token format")]
    InvalidTokenFormat,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Wrong token type")]
    WrongTokenType,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Token not recognized")]
    TokenNotFound,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Token generation failed")]
    TokenGenerationFailed,
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::TokenGenerationFailed => ErrorKind::Internal,
            _ => ErrorKind::Authentication,
        }
    }
}
