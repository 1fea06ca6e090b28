//! Structurally validated inputs for account operations

use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use crate::errors::DomainError;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignUpInput {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    // bcrypt ignores everything past 72 bytes
    #[validate(length(min = 8, max = 72, message = "password must be 8-72 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignInInput {
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

impl SignUpInput {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }
}

impl SignInInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }
}

/// Runs the derived checks and folds every failure into one validation error
pub(crate) fn check<T: Validate>(input: &T) -> Result<(), DomainError> {
    input.validate().map_err(|errors| DomainError::validation(describe(&errors)))
}

fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, failures)| {
            failures.iter().map(move |failure| match &failure.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_input_trims_name_and_email() {
        let input = SignUpInput::new("  Ana ", " ana@x.com ", "Secret123!");
        assert_eq!(input.name, "Ana");
        assert_eq!(input.email, "ana@x.com");
        assert!(check(&input).is_ok());
    }

    #[test]
    fn test_sign_up_input_collects_all_failures() {
        let input = SignUpInput::new("", "not-an-email", "short");
        let message = match check(&input) {
            Err(DomainError::Validation { message }) => message,
            other => panic!("expected validation error, got {other:?}"),
        };
        assert!(message.contains("name must be 1-100 characters"));
        assert!(message.contains("email is invalid"));
        assert!(message.contains("password must be 8-72 characters"));
    }

    #[test]
    fn test_sign_in_requires_password() {
        assert!(check(&SignInInput::new("ana@x.com", "")).is_err());
    }
}
