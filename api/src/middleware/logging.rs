//! Start and finish log entries for every call

use async_trait::async_trait;
use tokio::time::Instant;
use tonic::Code;
use tracing::{error, info, warn};

use super::body::{observe, Completion};
use super::context::CallContext;
use super::response::code_name;
use super::{GrpcRequest, GrpcResponse, Middleware, Next};

pub struct AccessLogMiddleware;

#[async_trait]
impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &'static str {
        "access_log"
    }

    async fn handle(&self, req: GrpcRequest, next: Next<'_>) -> GrpcResponse {
        let (method, correlation_id, user_id, deadline) = match req.extensions().get::<CallContext>() {
            Some(context) => (
                context.method.label().to_string(),
                context.correlation_id.clone(),
                context.user_id().unwrap_or_default(),
                context.deadline,
            ),
            None => (req.uri().path().to_string(), String::new(), String::new(), None),
        };

        info!(%method, %correlation_id, %user_id, "rpc started");

        let started = Instant::now();
        let completion = Completion::new(deadline, move |code| {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let code_label = code_name(code);
            match code {
                Code::Ok => info!(%method, %correlation_id, code = code_label, elapsed_ms, "rpc finished"),
                Code::Internal | Code::Unknown | Code::DataLoss => {
                    error!(%method, %correlation_id, code = code_label, elapsed_ms, "rpc failed")
                }
                _ => warn!(%method, %correlation_id, code = code_label, elapsed_ms, "rpc finished"),
            }
        });

        let response = next.run(req).await;
        observe(response, completion)
    }
}
