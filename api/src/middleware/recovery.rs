//! Outermost stage: panic containment and the server-side deadline

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::time::Instant;
use tonic::Code;
use tracing::{error, warn};

use super::context::CallContext;
use super::response::{set_request_id, status_response};
use super::{GrpcRequest, GrpcResponse, Middleware, Next};
use crate::server::shutdown::CancelListener;
use crate::telemetry::panic_message;

/// Turns a panic anywhere below it into `Internal`, a call running past
/// the configured deadline into `DeadlineExceeded`, and a call still running
/// when shutdown cancels in-flight work into `Unavailable`. None of these
/// affects other calls in flight.
pub struct RecoveryMiddleware {
    timeout: Option<Duration>,
    cancel: Option<CancelListener>,
}

impl RecoveryMiddleware {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout, cancel: None }
    }

    pub fn with_cancellation(mut self, cancel: CancelListener) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

async fn cancelled(listener: Option<CancelListener>) {
    match listener {
        Some(mut listener) => listener.cancelled().await,
        None => std::future::pending().await,
    }
}

fn reject(code: Code, message: &str, correlation_id: &str) -> GrpcResponse {
    let mut response = status_response(code, message);
    set_request_id(&mut response, correlation_id);
    response
}

#[async_trait]
impl Middleware for RecoveryMiddleware {
    fn name(&self) -> &'static str {
        "recovery"
    }

    async fn handle(&self, mut req: GrpcRequest, next: Next<'_>) -> GrpcResponse {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut method = req.uri().path().trim_start_matches('/').to_string();
        let mut correlation_id = String::new();
        if let Some(context) = req.extensions_mut().get_mut::<CallContext>() {
            context.deadline = deadline;
            method = context.method.label().to_string();
            correlation_id = context.correlation_id.clone();
        }

        let guarded = AssertUnwindSafe(next.run(req)).catch_unwind();
        // `None` once the deadline has passed
        let bounded = async {
            match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, guarded).await.ok(),
                None => Some(guarded.await),
            }
        };

        let outcome = tokio::select! {
            outcome = bounded => outcome,
            _ = cancelled(self.cancel.clone()) => {
                warn!(%method, %correlation_id, "rpc cancelled by shutdown");
                return reject(Code::Unavailable, "server shutting down", &correlation_id);
            }
        };
        let Some(outcome) = outcome else {
            warn!(%method, %correlation_id, "rpc exceeded server deadline");
            return reject(Code::DeadlineExceeded, "deadline exceeded", &correlation_id);
        };

        match outcome {
            Ok(response) => response,
            Err(payload) => {
                error!(
                    %method,
                    %correlation_id,
                    panic = %panic_message(payload.as_ref()),
                    "recovered from panic in rpc handler"
                );
                reject(Code::Internal, "internal error", &correlation_id)
            }
        }
    }
}
