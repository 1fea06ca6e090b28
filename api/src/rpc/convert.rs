//! Domain entities to wire messages

use ag_core::{TokenPair, User};

use crate::proto;

impl From<User> for proto::User {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name,
            email: user.email,
            created_at: user.created_at.timestamp(),
            updated_at: user.updated_at.timestamp(),
        }
    }
}

impl From<TokenPair> for proto::TokenPair {
    fn from(pair: TokenPair) -> Self {
        let expires_in = pair.access_expires_in();
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            access_expires_at: pair.access_expires_at.timestamp(),
            refresh_expires_at: pair.refresh_expires_at.timestamp(),
            token_type: pair.token_type,
            expires_in,
        }
    }
}
