//! Final-status observation for unary and streaming responses.
//!
//! A gRPC call is only over when the response body yields its trailers, so a
//! stage that wants the terminal code cannot read it when the handler
//! returns. [`observe`] attaches a [`Completion`] that fires exactly once:
//! on the `grpc-status` trailer, on a body error, at end of stream, or when
//! the body (or the stage future) is dropped early.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use tokio::time::Instant;
use tonic::body::BoxBody;
use tonic::{Code, Status};

use super::response::header_code;
use super::GrpcResponse;

type Callback = Box<dyn FnOnce(Code) + Send>;

/// One-shot callback receiving the terminal code of a call.
///
/// Dropping an unfinished completion reports `DeadlineExceeded` once the
/// server deadline has passed and `Cancelled` otherwise.
pub struct Completion {
    callback: Option<Callback>,
    deadline: Option<Instant>,
}

impl Completion {
    pub fn new(deadline: Option<Instant>, callback: impl FnOnce(Code) + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
            deadline,
        }
    }

    pub fn finish(&mut self, code: Code) {
        if let Some(callback) = self.callback.take() {
            callback(code);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.callback.is_none()
    }

    fn abandoned_code(&self) -> Code {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Code::DeadlineExceeded,
            _ => Code::Cancelled,
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.is_finished() {
            let code = self.abandoned_code();
            self.finish(code);
        }
    }
}

/// Response body that reports its terminal code to a [`Completion`]
pub struct ObservedBody {
    inner: BoxBody,
    completion: Completion,
}

impl ObservedBody {
    pub fn new(inner: BoxBody, completion: Completion) -> Self {
        Self { inner, completion }
    }
}

impl Body for ObservedBody {
    type Data = Bytes;
    type Error = Status;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(code) = frame
                    .trailers_ref()
                    .and_then(|trailers| trailers.get("grpc-status"))
                    .map(|value| Code::from_bytes(value.as_bytes()))
                {
                    this.completion.finish(code);
                }
            }
            Poll::Ready(Some(Err(status))) => this.completion.finish(status.code()),
            Poll::Ready(None) => this.completion.finish(Code::Ok),
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Attach `completion` to `response`.
///
/// Trailers-only responses already carry their code in the headers and
/// complete immediately.
pub fn observe(response: GrpcResponse, mut completion: Completion) -> GrpcResponse {
    if let Some(code) = header_code(&response) {
        completion.finish(code);
        return response;
    }

    response.map(|body| tonic::body::boxed(ObservedBody::new(body, completion)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::status_response;
    use http_body_util::BodyExt;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recorder() -> (Arc<Mutex<Vec<Code>>>, impl FnOnce(Code) + Send + 'static) {
        let codes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&codes);
        (codes, move |code| sink.lock().unwrap().push(code))
    }

    fn streaming_response(trailer: Option<&'static str>) -> GrpcResponse {
        let (mut sender, body) = http_body_util::channel::Channel::<Bytes, Status>::new(4);
        tokio::spawn(async move {
            let _ = sender.send_data(Bytes::from_static(b"frame")).await;
            if let Some(code) = trailer {
                let mut trailers = http::HeaderMap::new();
                trailers.insert("grpc-status", http::HeaderValue::from_static(code));
                let _ = sender.send_trailers(trailers).await;
            }
        });
        http::Response::new(tonic::body::boxed(body))
    }

    #[tokio::test]
    async fn test_trailers_only_response_completes_immediately() {
        let (codes, callback) = recorder();
        let _response = observe(
            status_response(Code::PermissionDenied, "no"),
            Completion::new(None, callback),
        );
        assert_eq!(*codes.lock().unwrap(), vec![Code::PermissionDenied]);
    }

    #[tokio::test]
    async fn test_streaming_body_completes_on_trailer() {
        let (codes, callback) = recorder();
        let response = observe(streaming_response(Some("5")), Completion::new(None, callback));
        assert!(codes.lock().unwrap().is_empty());

        let collected = response.into_body().collect().await.unwrap();
        assert_eq!(collected.trailers().unwrap()["grpc-status"], "5");
        assert_eq!(*codes.lock().unwrap(), vec![Code::NotFound]);
    }

    #[tokio::test]
    async fn test_dropped_body_reports_cancelled_once() {
        let (codes, callback) = recorder();
        let response = observe(streaming_response(Some("0")), Completion::new(None, callback));
        drop(response);
        assert_eq!(*codes.lock().unwrap(), vec![Code::Cancelled]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_after_deadline_reports_deadline_exceeded() {
        let (codes, callback) = recorder();
        let completion = Completion::new(Some(Instant::now() + Duration::from_secs(1)), callback);
        tokio::time::advance(Duration::from_secs(2)).await;
        drop(completion);
        assert_eq!(*codes.lock().unwrap(), vec![Code::DeadlineExceeded]);
    }
}
