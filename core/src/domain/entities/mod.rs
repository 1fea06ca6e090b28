//! Domain entities representing core business objects.

pub mod token;
pub mod user;

// Re-export commonly used types
pub use token::{AuthContext, Claims, Token, TokenPair, TokenType, JWT_ISSUER};
pub use user::User;
