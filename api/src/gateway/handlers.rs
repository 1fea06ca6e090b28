//! HTTP handlers. Each one translates a JSON call into the matching RPC over
//! the shared backing channel and maps the reply back.

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::http::header::{AUTHORIZATION, USER_AGENT};
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use tonic::metadata::MetadataValue;
use tracing::error;

use super::dto::{
    AccessTokenBody, AckBody, AuthBody, HealthBody, ListUsersQuery, RefreshBody, SignInBody,
    SignUpBody, TokenPairBody, UserListBody, ValidateBody, ValidateResultBody,
};
use super::error::GatewayError;
use super::GatewayState;
use crate::middleware::{correlation_id_from, parse_bearer, CLIENT_ID_HEADER, REQUEST_ID_HEADER};
use crate::proto::{
    HealthCheckRequest, ListUsersRequest, RefreshTokenRequest, RevokeTokenRequest, ServingStatus,
    SignInRequest, SignOutRequest, SignUpRequest, ValidateTokenRequest,
};

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

fn request_id(req: &HttpRequest) -> String {
    correlation_id_from(header(req, REQUEST_ID_HEADER))
}

/// Wrap `message` with the caller's credentials and identity as metadata.
///
/// tonic replaces `user-agent` with its own, so the caller's user agent
/// travels as the client id when no explicit one was sent.
fn forward<T>(req: &HttpRequest, request_id: &str, message: T) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    let metadata = request.metadata_mut();

    if let Some(value) = header(req, AUTHORIZATION.as_str()).and_then(|v| MetadataValue::try_from(v).ok()) {
        metadata.insert("authorization", value);
    }

    let client = header(req, CLIENT_ID_HEADER)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| header(req, USER_AGENT.as_str()));
    if let Some(value) = client.and_then(|v| MetadataValue::try_from(v).ok()) {
        metadata.insert(CLIENT_ID_HEADER, value);
    }

    if let Ok(value) = MetadataValue::try_from(request_id) {
        metadata.insert(REQUEST_ID_HEADER, value);
    }

    request
}

fn respond(mut builder: HttpResponseBuilder, request_id: &str) -> HttpResponseBuilder {
    builder.insert_header((REQUEST_ID_HEADER, request_id.to_string()));
    builder
}

/// Token from the body if present, else from `Authorization: Bearer`
fn token_from(req: &HttpRequest, supplied: Option<String>) -> Option<String> {
    supplied
        .filter(|token| !token.trim().is_empty())
        .or_else(|| header(req, AUTHORIZATION.as_str()).and_then(parse_bearer))
}

pub async fn sign_up(
    state: web::Data<GatewayState>,
    req: HttpRequest,
    body: web::Json<SignUpBody>,
) -> Result<HttpResponse, GatewayError> {
    let request_id = request_id(&req);
    let body = body.into_inner();
    let message = SignUpRequest {
        name: body.name,
        email: body.email,
        password: body.password,
    };

    let mut client = state.auth.clone();
    let response = client
        .sign_up(forward(&req, &request_id, message))
        .await
        .map_err(|status| GatewayError::new(status, &request_id))?;

    Ok(respond(HttpResponse::Created(), &request_id).json(AuthBody::from(response.into_inner())))
}

pub async fn sign_in(
    state: web::Data<GatewayState>,
    req: HttpRequest,
    body: web::Json<SignInBody>,
) -> Result<HttpResponse, GatewayError> {
    let request_id = request_id(&req);
    let body = body.into_inner();
    let message = SignInRequest {
        email: body.email,
        password: body.password,
    };

    let mut client = state.auth.clone();
    let response = client
        .sign_in(forward(&req, &request_id, message))
        .await
        .map_err(|status| GatewayError::new(status, &request_id))?;

    Ok(respond(HttpResponse::Ok(), &request_id).json(AuthBody::from(response.into_inner())))
}

pub async fn sign_out(
    state: web::Data<GatewayState>,
    req: HttpRequest,
    body: Option<web::Json<AccessTokenBody>>,
) -> Result<HttpResponse, GatewayError> {
    let request_id = request_id(&req);
    let supplied = body.and_then(|body| body.into_inner().access_token);
    let access_token = token_from(&req, supplied)
        .ok_or_else(|| GatewayError::bad_request("access_token is required", &request_id))?;

    let mut client = state.auth.clone();
    let response = client
        .sign_out(forward(&req, &request_id, SignOutRequest { access_token }))
        .await
        .map_err(|status| GatewayError::new(status, &request_id))?;

    Ok(respond(HttpResponse::Ok(), &request_id).json(AckBody::from(response.into_inner())))
}

pub async fn refresh(
    state: web::Data<GatewayState>,
    req: HttpRequest,
    body: web::Json<RefreshBody>,
) -> Result<HttpResponse, GatewayError> {
    let request_id = request_id(&req);
    let message = RefreshTokenRequest {
        refresh_token: body.into_inner().refresh_token,
    };

    let mut client = state.auth.clone();
    let response = client
        .refresh_token(forward(&req, &request_id, message))
        .await
        .map_err(|status| GatewayError::new(status, &request_id))?;

    Ok(respond(HttpResponse::Ok(), &request_id).json(TokenPairBody::from(response.into_inner())))
}

pub async fn revoke(
    state: web::Data<GatewayState>,
    req: HttpRequest,
    body: Option<web::Json<AccessTokenBody>>,
) -> Result<HttpResponse, GatewayError> {
    let request_id = request_id(&req);
    let supplied = body.and_then(|body| body.into_inner().access_token);
    let access_token = token_from(&req, supplied)
        .ok_or_else(|| GatewayError::bad_request("access_token is required", &request_id))?;

    let mut client = state.auth.clone();
    let response = client
        .revoke_token(forward(&req, &request_id, RevokeTokenRequest { access_token }))
        .await
        .map_err(|status| GatewayError::new(status, &request_id))?;

    Ok(respond(HttpResponse::Ok(), &request_id).json(AckBody::from(response.into_inner())))
}

pub async fn validate(
    state: web::Data<GatewayState>,
    req: HttpRequest,
    body: Option<web::Json<ValidateBody>>,
) -> Result<HttpResponse, GatewayError> {
    let request_id = request_id(&req);
    let supplied = body.and_then(|body| body.into_inner().token);
    let token = token_from(&req, supplied)
        .ok_or_else(|| GatewayError::bad_request("token is required", &request_id))?;

    let mut client = state.auth.clone();
    let response = client
        .validate_token(forward(&req, &request_id, ValidateTokenRequest { token }))
        .await
        .map_err(|status| GatewayError::new(status, &request_id))?;

    Ok(respond(HttpResponse::Ok(), &request_id).json(ValidateResultBody::from(response.into_inner())))
}

pub async fn list_users(
    state: web::Data<GatewayState>,
    req: HttpRequest,
    query: web::Query<ListUsersQuery>,
) -> Result<HttpResponse, GatewayError> {
    let request_id = request_id(&req);
    let message = ListUsersRequest {
        page: query.page,
        limit: query.limit,
    };

    let mut client = state.auth.clone();
    let response = client
        .list_users(forward(&req, &request_id, message))
        .await
        .map_err(|status| GatewayError::new(status, &request_id))?;

    Ok(respond(HttpResponse::Ok(), &request_id).json(UserListBody::from(response.into_inner())))
}

/// Pass-through to `Health.Check`; 503 unless storage is reachable
pub async fn health(state: web::Data<GatewayState>, req: HttpRequest) -> Result<HttpResponse, GatewayError> {
    let request_id = request_id(&req);

    let mut client = state.health.clone();
    let response = client
        .check(forward(&req, &request_id, HealthCheckRequest::default()))
        .await
        .map_err(|status| GatewayError::new(status, &request_id))?
        .into_inner();

    let serving = response.status() == ServingStatus::Serving;
    let body = HealthBody {
        status: if serving { "serving" } else { "not_serving" }.to_string(),
        backend: response.backend,
    };
    let builder = if serving {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };

    Ok(respond(builder, &request_id).json(body))
}

/// Process liveness; never touches the RPC side
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "authgate",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Prometheus text exposition of the shared registry
pub async fn metrics(state: web::Data<GatewayState>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&state.registry.gather(), &mut buffer) {
        Ok(()) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, GatewayError> {
    let request_id = request_id(&req);
    Err(GatewayError::new(
        tonic::Status::not_found(format!("no route for {} {}", req.method(), req.path())),
        request_id,
    ))
}

pub fn json_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    GatewayError::bad_request(err.to_string(), request_id(req)).into()
}

pub fn query_error(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    GatewayError::bad_request(err.to_string(), request_id(req)).into()
}
