//! Token entities for JWT-based authentication.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::User;

/// Default JWT issuer
pub const JWT_ISSUER: &str = "authgate";

/// Discriminates the two token tiers inside the signed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims structure for JWT payload.
///
/// Derived only while encoding or validating a token; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Owning user's id
    pub user_id: String,

    pub name: String,

    pub email: String,

    /// Token tier
    #[serde(rename = "type")]
    pub token_type: TokenType,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,

    /// Issuer
    pub iss: String,

    /// Unique identifier, so two tokens minted in the same second still differ
    pub jti: String,
}

impl Claims {
    /// Creates claims for `user` of the given tier
    ///
    /// # Arguments
    ///
    /// * `user` - The token owner
    /// * `token_type` - Access or refresh
    /// * `issued_at` - Issuance instant
    /// * `lifetime` - Configured lifetime of this tier
    /// * `issuer` - Value of the `iss` claim
    pub fn new(
        user: &User,
        token_type: TokenType,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
        issuer: &str,
    ) -> Self {
        Self {
            user_id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            token_type,
            iat: issued_at.timestamp(),
            exp: (issued_at + lifetime).timestamp(),
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Checks if the claims have expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Gets the user ID from the claims
    ///
    /// # Returns
    ///
    /// `Ok(Uuid)` if the subject can be parsed as a UUID, `Err` otherwise
    pub fn parsed_user_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.user_id)
    }
}

/// Issued token row, as stored by the token repository.
///
/// `refresh_expires_at > access_expires_at` holds for every row. Refresh
/// replaces the access fields in place; `is_revoked` is never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,

    pub user_id: Uuid,

    pub access_token: String,

    pub refresh_token: String,

    pub access_expires_at: DateTime<Utc>,

    pub refresh_expires_at: DateTime<Utc>,

    pub is_revoked: bool,

    pub created_at: DateTime<Utc>,
}

impl Token {
    /// Creates a new, unrevoked token row
    pub fn new(
        user_id: Uuid,
        access_token: String,
        refresh_token: String,
        access_expires_at: DateTime<Utc>,
        refresh_expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            is_revoked: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_access_expired(&self) -> bool {
        Utc::now() >= self.access_expires_at
    }

    pub fn is_refresh_expired(&self) -> bool {
        Utc::now() >= self.refresh_expires_at
    }

    /// Marks the row as revoked
    pub fn revoke(&mut self) {
        self.is_revoked = true;
    }

    /// Replaces the access credential, leaving the refresh side untouched
    pub fn replace_access(&mut self, access_token: String, access_expires_at: DateTime<Utc>) {
        self.access_token = access_token;
        self.access_expires_at = access_expires_at;
    }
}

/// Identity established by a successfully validated access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    /// Stored row the access token belongs to
    pub token_id: Uuid,
}

/// Token pair handed to a client after SignUp, SignIn or Refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,

    pub refresh_token: String,

    pub access_expires_at: DateTime<Utc>,

    pub refresh_expires_at: DateTime<Utc>,

    /// Token type for the Authorization header (always "Bearer")
    pub token_type: String,
}

impl TokenPair {
    pub fn new(
        access_token: String,
        refresh_token: String,
        access_expires_at: DateTime<Utc>,
        refresh_expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            token_type: "Bearer".to_string(),
        }
    }

    /// Builds the pair currently held by a stored row
    pub fn from_row(row: &Token) -> Self {
        Self::new(
            row.access_token.clone(),
            row.refresh_token.clone(),
            row.access_expires_at,
            row.refresh_expires_at,
        )
    }

    /// Seconds until the access token expires, counted from now
    pub fn access_expires_in(&self) -> i64 {
        (self.access_expires_at - Utc::now()).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new("Ana".to_string(), "ana@x.com".to_string(), "hash".to_string())
    }

    #[test]
    fn test_claims_carry_user_and_tier() {
        let user = user();
        let now = Utc::now();
        let claims = Claims::new(&user, TokenType::Access, now, Duration::minutes(15), JWT_ISSUER);

        assert_eq!(claims.user_id, user.id.to_string());
        assert_eq!(claims.name, "Ana");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert_eq!(claims.parsed_user_id().unwrap(), user.id);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_claims_serialize_type_field() {
        let claims = Claims::new(&user(), TokenType::Refresh, Utc::now(), Duration::days(7), JWT_ISSUER);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "refresh");
        assert!(json.get("token_type").is_none());
    }

    #[test]
    fn test_claims_get_unique_jti() {
        let user = user();
        let now = Utc::now();
        let a = Claims::new(&user, TokenType::Access, now, Duration::minutes(1), JWT_ISSUER);
        let b = Claims::new(&user, TokenType::Access, now, Duration::minutes(1), JWT_ISSUER);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_token_replace_access_keeps_refresh() {
        let now = Utc::now();
        let mut row = Token::new(
            Uuid::new_v4(),
            "access-1".to_string(),
            "refresh-1".to_string(),
            now + Duration::minutes(15),
            now + Duration::days(7),
        );
        let refresh_expiry = row.refresh_expires_at;

        row.replace_access("access-2".to_string(), now + Duration::minutes(30));

        assert_eq!(row.access_token, "access-2");
        assert_eq!(row.refresh_token, "refresh-1");
        assert_eq!(row.refresh_expires_at, refresh_expiry);
        assert!(!row.is_revoked);
    }

    #[test]
    fn test_token_revoke_is_sticky() {
        let now = Utc::now();
        let mut row = Token::new(
            Uuid::new_v4(),
            "a".to_string(),
            "r".to_string(),
            now - Duration::seconds(1),
            now + Duration::days(1),
        );
        assert!(row.is_access_expired());
        assert!(!row.is_refresh_expired());
        row.revoke();
        row.revoke();
        assert!(row.is_revoked);
    }

    #[test]
    fn test_token_pair_from_row() {
        let now = Utc::now();
        let row = Token::new(
            Uuid::new_v4(),
            "a".to_string(),
            "r".to_string(),
            now + Duration::minutes(15),
            now + Duration::days(7),
        );
        let pair = TokenPair::from_row(&row);
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.refresh_expires_at, row.refresh_expires_at);
        assert!(pair.access_expires_in() <= 15 * 60);
    }
}
