//! Per-client admission control

use std::sync::Arc;

use ag_core::services::UNKNOWN_CLIENT;
use ag_core::RateLimiter;
use async_trait::async_trait;
use http::header::USER_AGENT;
use http::HeaderMap;
use tonic::Code;
use tracing::warn;

use super::context::CallContext;
use super::response::{set_request_id, status_response};
use super::{GrpcRequest, GrpcResponse, Middleware, Next};

pub const CLIENT_ID_HEADER: &str = "x-client-id";

pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn handle(&self, req: GrpcRequest, next: Next<'_>) -> GrpcResponse {
        let client = client_id(req.headers());

        if !self.limiter.allow(&client).await {
            let (method, correlation_id) = req
                .extensions()
                .get::<CallContext>()
                .map(|context| (context.method.label().to_string(), context.correlation_id.clone()))
                .unwrap_or_default();
            warn!(%method, %correlation_id, client_id = %client, "rate limit exceeded");

            let mut response = status_response(Code::ResourceExhausted, "rate limit exceeded");
            set_request_id(&mut response, &correlation_id);
            return response;
        }

        next.run(req).await
    }
}

/// Explicit client id, then user agent, then the shared unknown bucket
pub fn client_id(headers: &HeaderMap) -> String {
    [CLIENT_ID_HEADER, USER_AGENT.as_str()]
        .into_iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_client_id_prefers_explicit_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("grpc-go/1.60"));
        assert_eq!(client_id(&headers), "grpc-go/1.60");

        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static("billing"));
        assert_eq!(client_id(&headers), "billing");
    }

    #[test]
    fn test_client_id_falls_back_to_unknown() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_id(&headers), UNKNOWN_CLIENT);

        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(client_id(&headers), UNKNOWN_CLIENT);
    }
}
