//! Authentication, authorization and audit for every call.
//!
//! Methods are classified by a static policy table. Anything the table does
//! not name is treated as protected, so a newly added RPC is closed until it
//! is listed.

use std::collections::HashMap;
use std::sync::Arc;

use ag_core::{AuthContext, DomainError, TokenService};
use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::HeaderMap;
use tonic::{Code, Status};
use tracing::{info, warn};

use crate::rpc::status::into_status;

use super::context::{CallContext, RpcMethod};
use super::response::{set_request_id, status_response};
use super::{GrpcRequest, GrpcResponse, Middleware, Next};

const AUTH_SERVICE: &str = "authgate.v1.AuthService";
const HEALTH_SERVICE: &str = "authgate.v1.Health";

/// How the pipeline treats one method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodPolicy {
    /// Requires a valid bearer access token
    pub protected: bool,
    /// Emits `audit` log entries
    pub audited: bool,
}

impl MethodPolicy {
    pub const PUBLIC: Self = Self { protected: false, audited: false };
    pub const PUBLIC_AUDITED: Self = Self { protected: false, audited: true };
    pub const PROTECTED: Self = Self { protected: true, audited: true };
}

/// Validates a bearer access token into an identity
#[async_trait]
pub trait AccessTokenValidator: Send + Sync {
    async fn validate_access(&self, token: &str) -> Result<AuthContext, DomainError>;
}

#[async_trait]
impl AccessTokenValidator for TokenService {
    async fn validate_access(&self, token: &str) -> Result<AuthContext, DomainError> {
        self.validate(token).await
    }
}

/// Decides whether an authenticated identity may call a method
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, identity: &AuthContext, method: &RpcMethod) -> Result<(), DomainError>;
}

/// Grants every authenticated identity every method
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _identity: &AuthContext, _method: &RpcMethod) -> Result<(), DomainError> {
        Ok(())
    }
}

pub struct SecurityMiddleware {
    policies: HashMap<String, MethodPolicy>,
    public_services: Vec<String>,
    validator: Arc<dyn AccessTokenValidator>,
    authorizer: Arc<dyn Authorizer>,
}

impl SecurityMiddleware {
    pub fn new(validator: Arc<dyn AccessTokenValidator>) -> Self {
        let mut policies = HashMap::new();
        for (method, policy) in [
            ("SignUp", MethodPolicy::PUBLIC_AUDITED),
            ("SignIn", MethodPolicy::PUBLIC_AUDITED),
            ("SignOut", MethodPolicy::PUBLIC_AUDITED),
            ("RefreshToken", MethodPolicy::PUBLIC_AUDITED),
            ("RevokeToken", MethodPolicy::PUBLIC_AUDITED),
            ("ValidateToken", MethodPolicy::PUBLIC),
            ("ListUsers", MethodPolicy::PROTECTED),
        ] {
            policies.insert(format!("/{AUTH_SERVICE}/{method}"), policy);
        }

        Self {
            policies,
            public_services: vec![HEALTH_SERVICE.to_string()],
            validator,
            authorizer: Arc::new(AllowAll),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn policy(&self, method: &RpcMethod) -> MethodPolicy {
        if let Some(policy) = self.policies.get(&method.path) {
            return *policy;
        }
        if self.public_services.iter().any(|service| *service == method.service) {
            return MethodPolicy::PUBLIC;
        }
        MethodPolicy::PROTECTED
    }

    /// Rejections keep the domain error's kind, so a storage outage while
    /// checking a token surfaces as UNAVAILABLE or INTERNAL rather than as a
    /// bad credential.
    async fn authenticate(
        &self,
        token: Option<String>,
        context: &CallContext,
    ) -> Result<AuthContext, Status> {
        let Some(token) = token else {
            return Err(Status::unauthenticated("missing bearer token"));
        };

        let identity = self
            .validator
            .validate_access(&token)
            .await
            .map_err(into_status)?;

        self.authorizer
            .authorize(&identity, &context.method)
            .await
            .map_err(into_status)?;

        Ok(identity)
    }
}

#[async_trait]
impl Middleware for SecurityMiddleware {
    fn name(&self) -> &'static str {
        "security"
    }

    async fn handle(&self, mut req: GrpcRequest, next: Next<'_>) -> GrpcResponse {
        let Some(context) = req.extensions().get::<CallContext>().cloned() else {
            return status_response(Code::Internal, "internal error");
        };
        let policy = self.policy(&context.method);
        let method = context.method.label().to_string();
        let correlation_id = context.correlation_id.clone();

        if policy.protected {
            let token = bearer_token(req.headers());
            match self.authenticate(token, &context).await {
                Ok(identity) => {
                    if policy.audited {
                        info!(
                            target: "audit",
                            %method,
                            %correlation_id,
                            user_id = %identity.user_id,
                            "access granted"
                        );
                    }
                    if let Some(context) = req.extensions_mut().get_mut::<CallContext>() {
                        context.identity = Some(identity);
                    }
                }
                Err(status) => {
                    warn!(
                        target: "audit",
                        %method,
                        %correlation_id,
                        code = ?status.code(),
                        reason = %status.message(),
                        "access denied"
                    );
                    let mut response = status_response(status.code(), status.message());
                    set_request_id(&mut response, &correlation_id);
                    return response;
                }
            }
        } else if policy.audited {
            info!(target: "audit", %method, %correlation_id, "public call");
        }

        let mut response = next.run(req).await;
        set_request_id(&mut response, &correlation_id);
        response
    }
}

/// Token from `authorization: Bearer <token>`; the scheme is case-insensitive
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    parse_bearer(headers.get(AUTHORIZATION)?.to_str().ok()?)
}

pub fn parse_bearer(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}
