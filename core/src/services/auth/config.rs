//! Configuration for the authentication service

use ag_shared::config::JwtConfig;

/// Configuration for the authentication service
#[derive(Debug, Clone)]
pub struct AuthServiceConfig {
    /// Whether SignUp accepts new accounts
    pub allow_registration: bool,
    /// bcrypt cost used for new password hashes
    pub bcrypt_cost: u32,
}

impl Default for AuthServiceConfig {
    fn default() -> Self {
        Self {
            allow_registration: true,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl From<&JwtConfig> for AuthServiceConfig {
    fn from(jwt: &JwtConfig) -> Self {
        Self {
            bcrypt_cost: jwt.bcrypt_cost,
            ..Default::default()
        }
    }
}
