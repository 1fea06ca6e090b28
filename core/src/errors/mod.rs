//! Domain-specific error types and error handling.

mod types;

pub use types::{AuthError, ErrorKind, TokenError};

use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Permission denied: {message}")]
    Authorization { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Operation timed out")]
    Timeout,

    #[error("Operation canceled")]
    Canceled,

    // Bridge to specific error types
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        DomainError::Internal { message: message.into() }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        DomainError::NotFound { resource: resource.into() }
    }

    /// Collapse the error onto the service-wide taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation { .. } => ErrorKind::Validation,
            DomainError::Authorization { .. } => ErrorKind::Authorization,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Conflict { .. } => ErrorKind::Conflict,
            DomainError::RateLimited => ErrorKind::RateLimited,
            DomainError::Internal { .. } => ErrorKind::Internal,
            DomainError::Unavailable { .. } => ErrorKind::Unavailable,
            DomainError::Timeout => ErrorKind::Timeout,
            DomainError::Canceled => ErrorKind::Canceled,
            DomainError::Auth(err) => err.kind(),
            DomainError::Token(err) => err.kind(),
        }
    }

    pub fn is_authentication(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    /// Message safe to hand to a caller. Internal details and backend
    /// outage descriptions are never exposed.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            ErrorKind::Unavailable => "service unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_are_authentication_failures() {
        for err in [
            TokenError::EmptyToken,
            TokenError::InvalidSignature,
            TokenError::InvalidTokenFormat,
            TokenError::WrongTokenType,
            TokenError::TokenExpired,
            TokenError::TokenRevoked,
            TokenError::TokenNotFound,
            TokenError::RefreshTokenExpired,
        ] {
            assert!(DomainError::from(err).is_authentication());
        }
    }

    #[test]
    fn test_token_generation_failure_is_internal() {
        let err = DomainError::from(TokenError::TokenGenerationFailed);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "internal error");
    }

    #[test]
    fn test_auth_error_kinds() {
        assert_eq!(DomainError::from(AuthError::UserAlreadyExists).kind(), ErrorKind::Conflict);
        assert_eq!(
            DomainError::from(AuthError::InvalidCredentials).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            DomainError::from(AuthError::InsufficientPermissions).kind(),
            ErrorKind::Authorization
        );
    }

    #[test]
    fn test_public_message_keeps_non_internal_detail() {
        let err = DomainError::validation("email is invalid");
        assert_eq!(err.public_message(), "Validation error: email is invalid");
        let err = DomainError::internal("connection refused on 10.0.0.3");
        assert!(!err.public_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_unavailable_detail_is_hidden() {
        let err = DomainError::Unavailable {
            message: "mysql unreachable at db-2:3306".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.public_message(), "service unavailable");
        assert!(err.to_string().contains("db-2:3306"));
    }
}
