//! Prometheus metrics recorded per RPC method

use std::time::Duration;

use async_trait::async_trait;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use tokio::time::Instant;
use tonic::Code;

use super::body::{observe, Completion};
use super::context::CallContext;
use super::response::code_name;
use super::{GrpcRequest, GrpcResponse, Middleware, Next};

/// RPC counters and latency histograms
#[derive(Clone)]
pub struct RpcMetrics {
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
}

impl RpcMetrics {
    /// Create the collectors and register them in `registry`
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new("authgate_rpc_requests_total", "Completed RPC calls by method and status code"),
            &["method", "code"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("authgate_rpc_request_duration_seconds", "RPC latency in seconds")
                // bcrypt dominates the slow end
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["method"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
        })
    }

    pub fn record(&self, method: &str, code: Code, elapsed: Duration) {
        self.requests_total
            .with_label_values(&[method, code_name(code)])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    }

    pub fn requests(&self, method: &str, code: Code) -> u64 {
        self.requests_total
            .with_label_values(&[method, code_name(code)])
            .get()
    }
}

pub struct MetricsMiddleware {
    metrics: RpcMetrics,
}

impl MetricsMiddleware {
    pub fn new(metrics: RpcMetrics) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn handle(&self, req: GrpcRequest, next: Next<'_>) -> GrpcResponse {
        let (method, deadline) = match req.extensions().get::<CallContext>() {
            Some(context) => (context.method.label().to_string(), context.deadline),
            None => (req.uri().path().trim_start_matches('/').to_string(), None),
        };

        let metrics = self.metrics.clone();
        let started = Instant::now();
        let completion = Completion::new(deadline, move |code| {
            metrics.record(&method, code, started.elapsed());
        });

        let response = next.run(req).await;
        observe(response, completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice_in_one_registry_fails() {
        let registry = Registry::new();
        assert!(RpcMetrics::register(&registry).is_ok());
        assert!(RpcMetrics::register(&registry).is_err());
    }

    #[test]
    fn test_record_counts_by_method_and_code() {
        let registry = Registry::new();
        let metrics = RpcMetrics::register(&registry).unwrap();

        metrics.record("authgate.v1.AuthService/SignIn", Code::Ok, Duration::from_millis(3));
        metrics.record("authgate.v1.AuthService/SignIn", Code::Ok, Duration::from_millis(5));
        metrics.record("authgate.v1.AuthService/SignIn", Code::Unauthenticated, Duration::from_millis(1));

        assert_eq!(metrics.requests("authgate.v1.AuthService/SignIn", Code::Ok), 2);
        assert_eq!(metrics.requests("authgate.v1.AuthService/SignIn", Code::Unauthenticated), 1);

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|family| family.get_name() == "authgate_rpc_request_duration_seconds"));
    }
}
