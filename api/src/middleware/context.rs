//! Per-call context carried in request extensions

use ag_core::AuthContext;
use http::{HeaderMap, Uri};
use tokio::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// Longer ids are replaced rather than trusted
const MAX_REQUEST_ID_LEN: usize = 128;

/// Fully-qualified RPC method, e.g. `/authgate.v1.AuthService/SignIn`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcMethod {
    pub path: String,
    pub service: String,
    pub name: String,
}

impl RpcMethod {
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim_start_matches('/');
        let (service, name) = trimmed.split_once('/').unwrap_or(("", trimmed));
        Self {
            path: path.to_string(),
            service: service.to_string(),
            name: name.to_string(),
        }
    }

    /// Label used by metrics and logs: `service/method` without the leading slash
    pub fn label(&self) -> &str {
        self.path.trim_start_matches('/')
    }
}

/// What every stage may know about the call in flight.
///
/// Created before the first stage runs. Security fills in `identity` for
/// protected methods; Recovery records the server-side deadline.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub method: RpcMethod,
    pub correlation_id: String,
    pub identity: Option<AuthContext>,
    pub deadline: Option<Instant>,
}

impl CallContext {
    pub fn from_parts(uri: &Uri, headers: &HeaderMap) -> Self {
        Self {
            method: RpcMethod::parse(uri.path()),
            correlation_id: correlation_id(headers),
            identity: None,
            deadline: None,
        }
    }

    pub fn user_id(&self) -> Option<String> {
        self.identity.as_ref().map(|identity| identity.user_id.to_string())
    }
}

/// Caller-supplied `x-request-id` if usable, otherwise a fresh UUID v4
pub fn correlation_id(headers: &HeaderMap) -> String {
    correlation_id_from(headers.get(REQUEST_ID_HEADER).and_then(|value| value.to_str().ok()))
}

pub fn correlation_id_from(supplied: Option<&str>) -> String {
    supplied
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_parse_splits_service_and_method() {
        let method = RpcMethod::parse("/authgate.v1.AuthService/ListUsers");
        assert_eq!(method.service, "authgate.v1.AuthService");
        assert_eq!(method.name, "ListUsers");
        assert_eq!(method.label(), "authgate.v1.AuthService/ListUsers");
    }

    #[test]
    fn test_parse_tolerates_paths_without_service() {
        let method = RpcMethod::parse("/ping");
        assert_eq!(method.service, "");
        assert_eq!(method.name, "ping");
    }

    #[test]
    fn test_correlation_id_reuses_caller_value() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-42"));
        assert_eq!(correlation_id(&headers), "req-42");
    }

    #[test]
    fn test_correlation_id_generated_when_missing_or_oversized() {
        let generated = correlation_id(&HeaderMap::new());
        assert!(Uuid::parse_str(&generated).is_ok());

        let mut headers = HeaderMap::new();
        let oversized = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&oversized).unwrap());
        assert_ne!(correlation_id(&headers), oversized);
    }
}
