//! `authgate.v1.Health`: storage reachability over unary and streaming calls

use std::sync::Arc;
use std::time::Duration;

use ag_core::StorageProbe;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info_span, warn, Instrument};

use crate::middleware::CallContext;
use crate::server::shutdown::CancelListener;
use crate::proto::health_server::Health as HealthApi;
use crate::proto::{HealthCheckRequest, HealthCheckResponse, ServingStatus};

const WATCH_BUFFER: usize = 4;

pub struct HealthRpc {
    probe: Arc<dyn StorageProbe>,
    probe_timeout: Duration,
    watch_interval: Duration,
    cancel: Option<CancelListener>,
}

impl HealthRpc {
    pub fn new(probe: Arc<dyn StorageProbe>, probe_timeout: Duration, watch_interval: Duration) -> Self {
        Self {
            probe,
            probe_timeout,
            watch_interval,
            cancel: None,
        }
    }

    /// End open watch streams with `Unavailable` once shutdown cancels
    /// in-flight calls
    pub fn with_cancellation(mut self, cancel: CancelListener) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

async fn cancelled(listener: &mut Option<CancelListener>) {
    match listener {
        Some(listener) => listener.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Ping the store under the short health timeout
async fn current_status(probe: &dyn StorageProbe, timeout: Duration) -> ServingStatus {
    match tokio::time::timeout(timeout, probe.ping()).await {
        Ok(Ok(())) => ServingStatus::Serving,
        Ok(Err(err)) => {
            warn!(backend = probe.backend(), error = %err, "storage probe failed");
            ServingStatus::NotServing
        }
        Err(_) => {
            warn!(backend = probe.backend(), timeout_ms = timeout.as_millis() as u64, "storage probe timed out");
            ServingStatus::NotServing
        }
    }
}

fn response(status: ServingStatus, backend: &str) -> HealthCheckResponse {
    let mut response = HealthCheckResponse {
        backend: backend.to_string(),
        ..Default::default()
    };
    response.set_status(status);
    response
}

#[tonic::async_trait]
impl HealthApi for HealthRpc {
    async fn check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let status = current_status(self.probe.as_ref(), self.probe_timeout).await;
        Ok(Response::new(response(status, self.probe.backend())))
    }

    type WatchStream = ReceiverStream<Result<HealthCheckResponse, Status>>;

    /// One task per watcher. It ends as soon as the watcher disconnects,
    /// which drops the receiving half of the channel.
    async fn watch(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        let correlation_id = request
            .extensions()
            .get::<CallContext>()
            .map(|context| context.correlation_id.clone())
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let probe = Arc::clone(&self.probe);
        let probe_timeout = self.probe_timeout;
        let mut cancel = self.cancel.clone();
        let mut ticker = interval(self.watch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let span = info_span!("health_watch", %correlation_id);
        tokio::spawn(
            async move {
                let mut last = None;
                loop {
                    tokio::select! {
                        _ = tx.closed() => break,
                        _ = cancelled(&mut cancel) => {
                            let _ = tx.send(Err(Status::unavailable("server shutting down"))).await;
                            break;
                        }
                        _ = ticker.tick() => {
                            let status = current_status(probe.as_ref(), probe_timeout).await;
                            if last == Some(status) {
                                continue;
                            }
                            if tx.send(Ok(response(status, probe.backend()))).await.is_err() {
                                break;
                            }
                            last = Some(status);
                        }
                    }
                }
                debug!("health watcher disconnected");
            }
            .instrument(span),
        );

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ag_core::DomainError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio_stream::StreamExt;

    struct Switch {
        up: AtomicBool,
    }

    #[async_trait]
    impl StorageProbe for Switch {
        async fn ping(&self) -> Result<(), DomainError> {
            if self.up.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(DomainError::Unavailable { message: "down".into() })
            }
        }

        fn backend(&self) -> &'static str {
            "switch"
        }
    }

    struct Hanging;

    #[async_trait]
    impl StorageProbe for Hanging {
        async fn ping(&self) -> Result<(), DomainError> {
            std::future::pending().await
        }

        fn backend(&self) -> &'static str {
            "hanging"
        }
    }

    fn health(probe: Arc<dyn StorageProbe>) -> HealthRpc {
        HealthRpc::new(probe, Duration::from_millis(200), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_check_reports_serving() {
        let probe = Arc::new(Switch { up: AtomicBool::new(true) });
        let reply = health(probe)
            .check(Request::new(HealthCheckRequest::default()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.status(), ServingStatus::Serving);
        assert_eq!(reply.backend, "switch");
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_times_out_to_not_serving() {
        let reply = health(Arc::new(Hanging))
            .check(Request::new(HealthCheckRequest::default()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.status(), ServingStatus::NotServing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_sends_only_changes() {
        let probe = Arc::new(Switch { up: AtomicBool::new(true) });
        let service = health(probe.clone());
        let mut stream = service
            .watch(Request::new(HealthCheckRequest::default()))
            .await
            .unwrap()
            .into_inner();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.status(), ServingStatus::Serving);

        probe.up.store(false, Ordering::SeqCst);
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.status(), ServingStatus::NotServing);

        probe.up.store(true, Ordering::SeqCst);
        let third = stream.next().await.unwrap().unwrap();
        assert_eq!(third.status(), ServingStatus::Serving);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_task_stops_when_watcher_leaves() {
        let probe = Arc::new(Switch { up: AtomicBool::new(true) });
        let service = health(probe.clone());
        let stream = service
            .watch(Request::new(HealthCheckRequest::default()))
            .await
            .unwrap()
            .into_inner();

        // test handle, service, watch task
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(Arc::strong_count(&probe), 3);

        drop(stream);
        drop(service);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(Arc::strong_count(&probe), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_ends_with_unavailable_on_shutdown() {
        use crate::server::shutdown::Cancellation;

        let cancellation = Cancellation::new();
        let service = health(Arc::new(Switch { up: AtomicBool::new(true) }))
            .with_cancellation(cancellation.listener());
        let mut stream = service
            .watch(Request::new(HealthCheckRequest::default()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(stream.next().await.unwrap().unwrap().status(), ServingStatus::Serving);

        cancellation.cancel();
        let status = stream.next().await.unwrap().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
        assert!(stream.next().await.is_none());
    }
}
