//! Request pipeline wrapping every call on the RPC listener.
//!
//! A pipeline is an ordered list of [`Middleware`] stages composed once at
//! startup. Each stage receives the request plus a [`Next`] handle; calling
//! [`Next::run`] hands the request to the following stage, and the last stage
//! hands it to the wrapped service. The order of the list is the order of
//! execution, outermost first:
//!
//! 1. [`RecoveryMiddleware`] - panics and the server-side deadline
//! 2. [`SecurityMiddleware`] - correlation id, bearer validation, audit
//! 3. [`MetricsMiddleware`] - latency and outcome per method
//! 4. [`RateLimitMiddleware`] - per-client admission
//! 5. [`AccessLogMiddleware`] - start and finish entries
//!
//! Streaming responses stay observed until their last frame: stages that
//! care about the final status attach a [`Completion`] to the response body
//! instead of reading it when the handler returns.

pub mod body;
pub mod context;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod recovery;
pub mod response;
pub mod security;

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tonic::body::BoxBody;
use tonic::codegen::StdError;
use tower::{Layer, Service, ServiceExt};
use tracing::error;

pub use body::{observe, Completion, ObservedBody};
pub use context::{correlation_id_from, CallContext, RpcMethod, REQUEST_ID_HEADER};
pub use logging::AccessLogMiddleware;
pub use metrics::{MetricsMiddleware, RpcMetrics};
pub use rate_limit::{client_id, RateLimitMiddleware, CLIENT_ID_HEADER};
pub use recovery::RecoveryMiddleware;
pub use response::{code_name, set_request_id, status_response};
pub use security::{
    parse_bearer, AccessTokenValidator, AllowAll, Authorizer, MethodPolicy, SecurityMiddleware,
};

pub type GrpcRequest = http::Request<BoxBody>;
pub type GrpcResponse = http::Response<BoxBody>;

/// Terminal handler the last stage hands the request to
pub type Endpoint = Box<dyn FnOnce(GrpcRequest) -> BoxFuture<'static, GrpcResponse> + Send>;

/// One cross-cutting stage of the pipeline
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    /// Handle the call. Stages that short-circuit return a response without
    /// calling `next`.
    async fn handle(&self, req: GrpcRequest, next: Next<'_>) -> GrpcResponse;
}

/// The remaining stages of a call plus its endpoint
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    endpoint: Endpoint,
}

impl<'a> Next<'a> {
    pub fn new(stages: &'a [Arc<dyn Middleware>], endpoint: Endpoint) -> Self {
        Self { stages, endpoint }
    }

    pub async fn run(self, req: GrpcRequest) -> GrpcResponse {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    endpoint: self.endpoint,
                };
                stage.handle(req, next).await
            }
            None => (self.endpoint)(req).await,
        }
    }
}

/// Ordered stages, shared by every connection
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Arc<dyn Middleware>]>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            stages: stages.into(),
        }
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }
}

impl<S> Layer<S> for Pipeline {
    type Service = PipelineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PipelineService {
            inner,
            stages: Arc::clone(&self.stages),
        }
    }
}

/// Tower service produced by [`Pipeline`]
#[derive(Clone)]
pub struct PipelineService<S> {
    inner: S,
    stages: Arc<[Arc<dyn Middleware>]>,
}

impl<S, B> Service<http::Request<B>> for PipelineService<S>
where
    S: Service<GrpcRequest, Response = GrpcResponse> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<StdError> + Send,
    B: http_body::Body<Data = bytes::Bytes> + Send + 'static,
    B::Error: Into<StdError>,
{
    type Response = GrpcResponse;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<GrpcResponse, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness of the inner service is awaited per call through `oneshot`
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let inner = self.inner.clone();
        let stages = Arc::clone(&self.stages);

        let mut req = req.map(tonic::body::boxed);
        let context = CallContext::from_parts(req.uri(), req.headers());
        req.extensions_mut().insert(context);

        Box::pin(async move {
            let endpoint: Endpoint = Box::new(move |req| {
                Box::pin(async move {
                    match inner.oneshot(req).await {
                        Ok(response) => response,
                        Err(err) => {
                            let err: StdError = err.into();
                            error!(error = %err, "rpc service failed");
                            status_response(tonic::Code::Internal, "internal error")
                        }
                    }
                })
            });

            Ok(Next::new(&stages, endpoint).run(req).await)
        })
    }
}
