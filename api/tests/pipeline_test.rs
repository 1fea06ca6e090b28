//! Request pipeline behavior, driven through a stand-in RPC endpoint

use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ag_api::middleware::{
    AccessLogMiddleware, AccessTokenValidator, Authorizer, CallContext, GrpcRequest, GrpcResponse,
    MetricsMiddleware, Middleware, Pipeline, RateLimitMiddleware, RecoveryMiddleware, RpcMethod,
    RpcMetrics, SecurityMiddleware, status_response,
};
use ag_api::server::shutdown::Cancellation;
use ag_core::services::SlidingWindowRateLimiter;
use ag_core::{AuthContext, DomainError, TokenError};
use async_trait::async_trait;
use prometheus::Registry;
use tonic::Code;
use tower::{Layer, ServiceExt};
use uuid::Uuid;

const SIGN_IN: &str = "/authgate.v1.AuthService/SignIn";
const LIST_USERS: &str = "/authgate.v1.AuthService/ListUsers";

struct StaticTokens;

#[async_trait]
impl AccessTokenValidator for StaticTokens {
    async fn validate_access(&self, token: &str) -> Result<AuthContext, DomainError> {
        if token == "good-token" {
            Ok(AuthContext {
                user_id: Uuid::nil(),
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                token_id: Uuid::nil(),
            })
        } else {
            Err(DomainError::Token(TokenError::InvalidSignature))
        }
    }
}

/// Token store that cannot be reached
struct StorageDown;

#[async_trait]
impl AccessTokenValidator for StorageDown {
    async fn validate_access(&self, _token: &str) -> Result<AuthContext, DomainError> {
        Err(DomainError::Unavailable {
            message: "mysql unreachable".to_string(),
        })
    }
}

/// Authorizer answering with a fixed error
struct Deny(fn() -> DomainError);

#[async_trait]
impl Authorizer for Deny {
    async fn authorize(&self, _identity: &AuthContext, _method: &RpcMethod) -> Result<(), DomainError> {
        Err((self.0)())
    }
}

struct Setup {
    pipeline: Pipeline,
    metrics: RpcMetrics,
}

fn setup(timeout: Option<Duration>, limit: Option<u32>) -> Setup {
    setup_with(SecurityMiddleware::new(Arc::new(StaticTokens)), timeout, limit)
}

fn setup_with(security: SecurityMiddleware, timeout: Option<Duration>, limit: Option<u32>) -> Setup {
    let metrics = RpcMetrics::register(&Registry::new()).unwrap();

    let mut stages: Vec<Arc<dyn Middleware>> = vec![
        Arc::new(RecoveryMiddleware::new(timeout)),
        Arc::new(security),
        Arc::new(MetricsMiddleware::new(metrics.clone())),
    ];
    if let Some(limit) = limit {
        let limiter = Arc::new(SlidingWindowRateLimiter::new(limit, Duration::from_secs(60)));
        stages.push(Arc::new(RateLimitMiddleware::new(limiter)));
    }
    stages.push(Arc::new(AccessLogMiddleware));

    Setup {
        pipeline: Pipeline::new(stages),
        metrics,
    }
}

fn request(path: &str, headers: &[(&str, &str)]) -> GrpcRequest {
    let mut builder = http::Request::builder().uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(tonic::body::empty_body()).unwrap()
}

fn grpc_code(response: &GrpcResponse) -> Code {
    let value = response.headers()["grpc-status"].to_str().unwrap();
    Code::from_i32(value.parse().unwrap())
}

async fn ok_endpoint(_req: GrpcRequest) -> Result<GrpcResponse, Infallible> {
    Ok(status_response(Code::Ok, ""))
}

#[tokio::test]
async fn test_panicking_handler_becomes_internal_and_server_keeps_serving() {
    let Setup { pipeline, .. } = setup(None, None);

    let panicking = tower::service_fn(|_req: GrpcRequest| async move {
        if true {
            panic!("handler exploded");
        }
        Ok::<GrpcResponse, Infallible>(status_response(Code::Ok, ""))
    });
    let response = pipeline
        .layer(panicking)
        .oneshot(request(SIGN_IN, &[]))
        .await
        .unwrap();
    assert_eq!(grpc_code(&response), Code::Internal);

    let response = pipeline
        .layer(tower::service_fn(ok_endpoint))
        .oneshot(request(SIGN_IN, &[]))
        .await
        .unwrap();
    assert_eq!(grpc_code(&response), Code::Ok);
}

#[tokio::test(start_paused = true)]
async fn test_slow_handler_hits_server_deadline() {
    let Setup { pipeline, metrics } = setup(Some(Duration::from_millis(200)), None);

    let slow = tower::service_fn(|_req: GrpcRequest| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, Infallible>(status_response(Code::Ok, ""))
    });
    let response = pipeline
        .layer(slow)
        .oneshot(request(SIGN_IN, &[]))
        .await
        .unwrap();

    assert_eq!(grpc_code(&response), Code::DeadlineExceeded);
    assert_eq!(
        metrics.requests("authgate.v1.AuthService/SignIn", Code::DeadlineExceeded),
        1
    );
}

#[tokio::test]
async fn test_protected_method_without_token_never_reaches_handler() {
    let Setup { pipeline, .. } = setup(None, None);
    let reached = Arc::new(Mutex::new(false));

    let flag = Arc::clone(&reached);
    let endpoint = tower::service_fn(move |_req: GrpcRequest| {
        let flag = Arc::clone(&flag);
        async move {
            *flag.lock().unwrap() = true;
            Ok::<_, Infallible>(status_response(Code::Ok, ""))
        }
    });

    let response = pipeline
        .layer(endpoint.clone())
        .oneshot(request(LIST_USERS, &[]))
        .await
        .unwrap();
    assert_eq!(grpc_code(&response), Code::Unauthenticated);

    let response = pipeline
        .layer(endpoint)
        .oneshot(request(LIST_USERS, &[("authorization", "Bearer forged")]))
        .await
        .unwrap();
    assert_eq!(grpc_code(&response), Code::Unauthenticated);

    assert!(!*reached.lock().unwrap());
}

#[tokio::test]
async fn test_valid_token_attaches_identity() {
    let Setup { pipeline, .. } = setup(None, None);
    let seen = Arc::new(Mutex::new(None));

    let captured = Arc::clone(&seen);
    let endpoint = tower::service_fn(move |req: GrpcRequest| {
        let captured = Arc::clone(&captured);
        async move {
            *captured.lock().unwrap() = req
                .extensions()
                .get::<CallContext>()
                .and_then(|context| context.identity.clone());
            Ok::<_, Infallible>(status_response(Code::Ok, ""))
        }
    });

    let response = pipeline
        .layer(endpoint)
        .oneshot(request(LIST_USERS, &[("authorization", "bearer good-token")]))
        .await
        .unwrap();

    assert_eq!(grpc_code(&response), Code::Ok);
    let identity = seen.lock().unwrap().clone().expect("identity attached");
    assert_eq!(identity.email, "ana@example.com");
}

#[tokio::test]
async fn test_unknown_method_is_treated_as_protected() {
    let Setup { pipeline, .. } = setup(None, None);
    let response = pipeline
        .layer(tower::service_fn(ok_endpoint))
        .oneshot(request("/authgate.v1.AuthService/DropAllUsers", &[]))
        .await
        .unwrap();
    assert_eq!(grpc_code(&response), Code::Unauthenticated);
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let Setup { pipeline, metrics } = setup(None, Some(2));
    let call = |client: &'static str| {
        pipeline
            .layer(tower::service_fn(ok_endpoint))
            .oneshot(request(SIGN_IN, &[("x-client-id", client)]))
    };

    assert_eq!(grpc_code(&call("client-a").await.unwrap()), Code::Ok);
    assert_eq!(grpc_code(&call("client-a").await.unwrap()), Code::Ok);
    assert_eq!(grpc_code(&call("client-a").await.unwrap()), Code::ResourceExhausted);
    assert_eq!(grpc_code(&call("client-b").await.unwrap()), Code::Ok);

    let label = "authgate.v1.AuthService/SignIn";
    assert_eq!(metrics.requests(label, Code::Ok), 3);
    assert_eq!(metrics.requests(label, Code::ResourceExhausted), 1);
}

#[tokio::test]
async fn test_request_id_is_echoed_on_success_and_rejection() {
    let Setup { pipeline, .. } = setup(None, None);

    let response = pipeline
        .layer(tower::service_fn(ok_endpoint))
        .oneshot(request(SIGN_IN, &[("x-request-id", "req-42")]))
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let response = pipeline
        .layer(tower::service_fn(ok_endpoint))
        .oneshot(request(LIST_USERS, &[("x-request-id", "req-43")]))
        .await
        .unwrap();
    assert_eq!(grpc_code(&response), Code::Unauthenticated);
    assert_eq!(response.headers()["x-request-id"], "req-43");
}

#[tokio::test]
async fn test_token_store_outage_is_unavailable_not_unauthenticated() {
    let Setup { pipeline, .. } =
        setup_with(SecurityMiddleware::new(Arc::new(StorageDown)), None, None);

    let response = pipeline
        .layer(tower::service_fn(ok_endpoint))
        .oneshot(request(
            LIST_USERS,
            &[("authorization", "Bearer good-token"), ("x-request-id", "req-503")],
        ))
        .await
        .unwrap();

    assert_eq!(grpc_code(&response), Code::Unavailable);
    let message = response.headers()["grpc-message"].to_str().unwrap();
    assert!(!message.contains("mysql"));
    assert_eq!(response.headers()["x-request-id"], "req-503");
}

#[tokio::test]
async fn test_authorizer_errors_keep_their_kind() {
    let denied = SecurityMiddleware::new(Arc::new(StaticTokens)).with_authorizer(Arc::new(Deny(
        || DomainError::Authorization {
            message: "admins only".to_string(),
        },
    )));
    let Setup { pipeline, .. } = setup_with(denied, None, None);
    let response = pipeline
        .layer(tower::service_fn(ok_endpoint))
        .oneshot(request(LIST_USERS, &[("authorization", "Bearer good-token")]))
        .await
        .unwrap();
    assert_eq!(grpc_code(&response), Code::PermissionDenied);

    let broken = SecurityMiddleware::new(Arc::new(StaticTokens))
        .with_authorizer(Arc::new(Deny(|| DomainError::internal("policy store corrupt"))));
    let Setup { pipeline, .. } = setup_with(broken, None, None);
    let response = pipeline
        .layer(tower::service_fn(ok_endpoint))
        .oneshot(request(LIST_USERS, &[("authorization", "Bearer good-token")]))
        .await
        .unwrap();
    assert_eq!(grpc_code(&response), Code::Internal);
    let message = response.headers()["grpc-message"].to_str().unwrap();
    assert!(!message.contains("policy"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancellation_cuts_off_running_call() {
    let cancellation = Cancellation::new();
    let metrics = RpcMetrics::register(&Registry::new()).unwrap();
    let pipeline = Pipeline::new(vec![
        Arc::new(RecoveryMiddleware::new(None).with_cancellation(cancellation.listener())),
        Arc::new(SecurityMiddleware::new(Arc::new(StaticTokens))),
        Arc::new(MetricsMiddleware::new(metrics.clone())),
        Arc::new(AccessLogMiddleware),
    ]);

    let slow = tower::service_fn(|_req: GrpcRequest| async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<_, Infallible>(status_response(Code::Ok, ""))
    });
    let call = tokio::spawn(
        pipeline
            .layer(slow)
            .oneshot(request(SIGN_IN, &[("x-request-id", "req-drain")])),
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancellation.cancel();
    let response = call.await.unwrap().unwrap();

    assert_eq!(grpc_code(&response), Code::Unavailable);
    assert_eq!(response.headers()["x-request-id"], "req-drain");
    assert_eq!(metrics.requests("authgate.v1.AuthService/SignIn", Code::Cancelled), 1);
}
