//! RPC status to HTTP response mapping

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use ag_shared::{error_codes, ErrorResponse};
use thiserror::Error;
use tonic::{Code, Status};

use crate::middleware::REQUEST_ID_HEADER;

/// Failure of a gateway call, rendered as the shared JSON error body
#[derive(Debug, Error)]
#[error("{}: {}", .status.code(), .status.message())]
pub struct GatewayError {
    status: Status,
    request_id: Option<String>,
}

impl GatewayError {
    pub fn new(status: Status, request_id: impl Into<String>) -> Self {
        Self {
            status,
            request_id: Some(request_id.into()),
        }
    }

    pub fn bad_request(message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(Status::invalid_argument(message), request_id)
    }

    pub fn code(&self) -> Code {
        self.status.code()
    }
}

/// HTTP status for an RPC code
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        // nginx's "client closed request"
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_code(code: Code) -> &'static str {
    match code {
        Code::InvalidArgument => error_codes::VALIDATION_ERROR,
        Code::Unauthenticated => error_codes::UNAUTHORIZED,
        Code::PermissionDenied => error_codes::FORBIDDEN,
        Code::NotFound => error_codes::NOT_FOUND,
        Code::AlreadyExists => error_codes::CONFLICT,
        Code::ResourceExhausted => error_codes::RATE_LIMIT_EXCEEDED,
        Code::Cancelled => error_codes::REQUEST_CANCELLED,
        Code::Unavailable => error_codes::SERVICE_UNAVAILABLE,
        Code::DeadlineExceeded => error_codes::TIMEOUT,
        _ => error_codes::INTERNAL_ERROR,
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        http_status(self.status.code())
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.status.code();
        let message = match code {
            Code::Internal | Code::Unknown | Code::DataLoss => "internal error".to_string(),
            _ => self.status.message().to_string(),
        };

        let mut body = ErrorResponse::new(error_code(code), message);
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(request_id) = &self.request_id {
            body = body.with_request_id(request_id.clone());
            builder.insert_header((REQUEST_ID_HEADER, request_id.clone()));
        }
        builder.json(body)
    }
}
