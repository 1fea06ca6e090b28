//! Building and decorating gRPC responses outside of a handler

use http::header::{HeaderValue, CONTENT_TYPE};
use tonic::{Code, Status};
use tracing::warn;

use super::context::REQUEST_ID_HEADER;
use super::GrpcResponse;

/// Trailers-only response carrying `code` and `message`
pub fn status_response(code: Code, message: impl Into<String>) -> GrpcResponse {
    let mut response = http::Response::new(tonic::body::empty_body());
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/grpc"));

    if let Err(status) = Status::new(code, message).add_header(headers) {
        warn!(error = %status, "could not encode status headers");
        headers.insert("grpc-status", HeaderValue::from(code as i32));
    }

    response
}

/// Echo the correlation id back to the caller
pub fn set_request_id(response: &mut GrpcResponse, correlation_id: &str) {
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

/// Code carried in the headers of a trailers-only response
pub fn header_code(response: &GrpcResponse) -> Option<Code> {
    response
        .headers()
        .get("grpc-status")
        .map(|value| Code::from_bytes(value.as_bytes()))
}

/// Canonical upper-case name, as used in metric labels and logs
pub fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
    }
}
