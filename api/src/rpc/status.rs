//! Domain error to gRPC status mapping

use ag_core::{DomainError, ErrorKind};
use tonic::{Code, Status};
use tracing::{error, warn};

/// gRPC code for each kind of domain failure
pub fn code_for(kind: ErrorKind) -> Code {
    match kind {
        ErrorKind::Validation => Code::InvalidArgument,
        ErrorKind::Authentication => Code::Unauthenticated,
        ErrorKind::Authorization => Code::PermissionDenied,
        ErrorKind::NotFound => Code::NotFound,
        ErrorKind::Conflict => Code::AlreadyExists,
        ErrorKind::RateLimited => Code::ResourceExhausted,
        ErrorKind::Internal => Code::Internal,
        ErrorKind::Unavailable => Code::Unavailable,
        ErrorKind::Timeout => Code::DeadlineExceeded,
        ErrorKind::Canceled => Code::Cancelled,
    }
}

/// Convert a domain error into the status sent to the caller.
///
/// Internal and backend failures are logged here and reach the caller only
/// as a generic message.
pub fn into_status(err: DomainError) -> Status {
    let kind = err.kind();
    match kind {
        ErrorKind::Internal => error!(error = %err, "internal failure while serving rpc"),
        ErrorKind::Unavailable => warn!(error = %err, "backend unavailable while serving rpc"),
        _ => {}
    }
    Status::new(code_for(kind), err.public_message())
}
