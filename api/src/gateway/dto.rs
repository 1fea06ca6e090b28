//! JSON request and response bodies

use serde::{Deserialize, Serialize};

use crate::proto;

#[derive(Debug, Deserialize)]
pub struct SignUpBody {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    pub email: String,
    pub password: String,
}

/// SignOut and Revoke; the token may come from `Authorization` instead
#[derive(Debug, Default, Deserialize)]
pub struct AccessTokenBody {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshBody {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidateBody {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserBody {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<proto::User> for UserBody {
    fn from(user: proto::User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPairBody {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

impl From<proto::TokenPair> for TokenPairBody {
    fn from(pair: proto::TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
            expires_in: pair.expires_in,
            access_expires_at: pair.access_expires_at,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthBody {
    pub user: Option<UserBody>,
    pub tokens: Option<TokenPairBody>,
}

impl From<proto::AuthResponse> for AuthBody {
    fn from(response: proto::AuthResponse) -> Self {
        Self {
            user: response.user.map(Into::into),
            tokens: response.tokens.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AckBody {
    pub success: bool,
    pub message: String,
}

impl From<proto::AckResponse> for AckBody {
    fn from(ack: proto::AckResponse) -> Self {
        Self {
            success: ack.success,
            message: ack.message,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResultBody {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<proto::ValidateTokenResponse> for ValidateResultBody {
    fn from(response: proto::ValidateTokenResponse) -> Self {
        let non_empty = |value: String| (!value.is_empty()).then_some(value);
        Self {
            valid: response.valid,
            user_id: non_empty(response.user_id),
            error: non_empty(response.error_message),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListBody {
    pub users: Vec<UserBody>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl From<proto::ListUsersResponse> for UserListBody {
    fn from(response: proto::ListUsersResponse) -> Self {
        let total_pages = ag_shared::Pagination::new(response.page, response.limit).total_pages(response.total);
        Self {
            users: response.users.into_iter().map(Into::into).collect(),
            total: response.total,
            page: response.page,
            limit: response.limit,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub backend: String,
}
