//! `authgate.v1.AuthService`

use std::sync::Arc;

use ag_core::services::{SignInInput, SignUpInput};
use ag_core::AuthService;
use ag_shared::Pagination;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use super::status::into_status;
use crate::middleware::CallContext;
use crate::proto::auth_service_server::AuthService as AuthServiceApi;
use crate::proto::{
    AckResponse, AuthResponse, ListUsersRequest, ListUsersResponse, RefreshTokenRequest,
    RevokeTokenRequest, SignInRequest, SignOutRequest, SignUpRequest, TokenPair,
    ValidateTokenRequest, ValidateTokenResponse,
};

/// Thin adapter from wire messages onto [`AuthService`]
pub struct AuthRpc {
    auth: Arc<AuthService>,
}

impl AuthRpc {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }
}

fn correlation_id<T>(request: &Request<T>) -> String {
    request
        .extensions()
        .get::<CallContext>()
        .map(|context| context.correlation_id.clone())
        .unwrap_or_default()
}

#[tonic::async_trait]
impl AuthServiceApi for AuthRpc {
    async fn sign_up(&self, request: Request<SignUpRequest>) -> Result<Response<AuthResponse>, Status> {
        let correlation_id = correlation_id(&request);
        let message = request.into_inner();
        let input = SignUpInput::new(message.name, message.email, message.password);

        let session = self.auth.sign_up(input).await.map_err(into_status)?;
        info!(%correlation_id, user_id = %session.user.id, "user signed up");

        Ok(Response::new(AuthResponse {
            user: Some(session.user.into()),
            tokens: Some(session.tokens.into()),
        }))
    }

    async fn sign_in(&self, request: Request<SignInRequest>) -> Result<Response<AuthResponse>, Status> {
        let correlation_id = correlation_id(&request);
        let message = request.into_inner();
        let input = SignInInput::new(message.email, message.password);

        let session = self.auth.sign_in(input).await.map_err(into_status)?;
        info!(%correlation_id, user_id = %session.user.id, "user signed in");

        Ok(Response::new(AuthResponse {
            user: Some(session.user.into()),
            tokens: Some(session.tokens.into()),
        }))
    }

    async fn sign_out(&self, request: Request<SignOutRequest>) -> Result<Response<AckResponse>, Status> {
        let message = request.into_inner();
        self.auth
            .sign_out(&message.access_token)
            .await
            .map_err(into_status)?;

        Ok(Response::new(AckResponse {
            success: true,
            message: "signed out".to_string(),
        }))
    }

    async fn refresh_token(
        &self,
        request: Request<RefreshTokenRequest>,
    ) -> Result<Response<TokenPair>, Status> {
        let message = request.into_inner();
        let pair = self
            .auth
            .refresh(&message.refresh_token)
            .await
            .map_err(into_status)?;

        Ok(Response::new(pair.into()))
    }

    async fn revoke_token(
        &self,
        request: Request<RevokeTokenRequest>,
    ) -> Result<Response<AckResponse>, Status> {
        let correlation_id = correlation_id(&request);
        let message = request.into_inner();
        self.auth
            .revoke(&message.access_token)
            .await
            .map_err(into_status)?;
        info!(%correlation_id, "access token revoked");

        Ok(Response::new(AckResponse {
            success: true,
            message: "token revoked".to_string(),
        }))
    }

    /// Authentication failures are an answer, not an error: the caller gets
    /// `valid = false` with the reason. Anything else is a real failure.
    async fn validate_token(
        &self,
        request: Request<ValidateTokenRequest>,
    ) -> Result<Response<ValidateTokenResponse>, Status> {
        let message = request.into_inner();

        let response = match self.auth.validate(&message.token).await {
            Ok(identity) => ValidateTokenResponse {
                user_id: identity.user_id.to_string(),
                valid: true,
                error_message: String::new(),
            },
            Err(err) if err.is_authentication() => {
                debug!(reason = %err, "token rejected");
                ValidateTokenResponse {
                    user_id: String::new(),
                    valid: false,
                    error_message: err.to_string(),
                }
            }
            Err(err) => return Err(into_status(err)),
        };

        Ok(Response::new(response))
    }

    async fn list_users(
        &self,
        request: Request<ListUsersRequest>,
    ) -> Result<Response<ListUsersResponse>, Status> {
        // The pipeline only lets this through with an identity attached
        let caller = request
            .extensions()
            .get::<CallContext>()
            .and_then(|context| context.identity.clone())
            .ok_or_else(|| Status::unauthenticated("missing bearer token"))?;

        let message = request.into_inner();
        let page = Pagination::new(message.page, message.limit);
        let (users, total) = self.auth.list_users(page).await.map_err(into_status)?;
        debug!(caller = %caller.user_id, count = users.len(), total, "listed users");

        Ok(Response::new(ListUsersResponse {
            users: users.into_iter().map(Into::into).collect(),
            total,
            page: page.page,
            limit: page.limit,
        }))
    }
}
