//! Server configuration module

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{env_or, env_string};

/// Listener configuration for the RPC server and the HTTP/JSON gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// RPC listener host address
    pub rpc_host: String,

    /// RPC listener port (0 = ephemeral)
    pub rpc_port: u16,

    /// Gateway listener host address
    pub gateway_host: String,

    /// Gateway listener port (0 = ephemeral)
    pub gateway_port: u16,

    /// Gateway worker threads (0 = number of CPU cores)
    #[serde(default)]
    pub gateway_workers: usize,

    /// Server-side deadline for a single call in milliseconds (0 = none)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Time allowed for in-flight RPC calls to drain on shutdown, in seconds
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,

    /// Time allowed for the gateway to stop, in seconds
    #[serde(default = "default_gateway_shutdown_timeout")]
    pub gateway_shutdown_timeout_seconds: u64,

    /// Connection attempts made while waiting for the RPC listener
    #[serde(default = "default_readiness_attempts")]
    pub readiness_attempts: u32,

    /// Delay between readiness attempts in milliseconds
    #[serde(default = "default_readiness_interval")]
    pub readiness_interval_ms: u64,

    /// Connect timeout of the gateway's backing channel in milliseconds
    #[serde(default = "default_backend_connect_timeout")]
    pub backend_connect_timeout_ms: u64,

    /// HTTP/2 keep-alive ping interval of the backing channel in seconds
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_seconds: u64,

    /// HTTP/2 keep-alive ping timeout of the backing channel in seconds
    #[serde(default = "default_keep_alive_timeout")]
    pub keep_alive_timeout_seconds: u64,

    #[serde(default)]
    pub health: HealthConfig,

    /// TLS configuration for the RPC listener
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rpc_host: String::from("0.0.0.0"),
            rpc_port: 50051,
            gateway_host: String::from("0.0.0.0"),
            gateway_port: 8080,
            gateway_workers: 0,
            request_timeout_ms: default_request_timeout(),
            shutdown_grace_seconds: default_shutdown_grace(),
            gateway_shutdown_timeout_seconds: default_gateway_shutdown_timeout(),
            readiness_attempts: default_readiness_attempts(),
            readiness_interval_ms: default_readiness_interval(),
            backend_connect_timeout_ms: default_backend_connect_timeout(),
            keep_alive_interval_seconds: default_keep_alive_interval(),
            keep_alive_timeout_seconds: default_keep_alive_timeout(),
            health: HealthConfig::default(),
            tls: None,
        }
    }
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rpc_host: env_string("RPC_HOST").unwrap_or(defaults.rpc_host),
            rpc_port: env_or("RPC_PORT", defaults.rpc_port),
            gateway_host: env_string("GATEWAY_HOST").unwrap_or(defaults.gateway_host),
            gateway_port: env_or("GATEWAY_PORT", defaults.gateway_port),
            gateway_workers: env_or("GATEWAY_WORKERS", defaults.gateway_workers),
            request_timeout_ms: env_or("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
            shutdown_grace_seconds: env_or("SHUTDOWN_GRACE_SECS", defaults.shutdown_grace_seconds),
            gateway_shutdown_timeout_seconds: env_or(
                "GATEWAY_SHUTDOWN_TIMEOUT_SECS",
                defaults.gateway_shutdown_timeout_seconds,
            ),
            readiness_attempts: env_or("READINESS_ATTEMPTS", defaults.readiness_attempts),
            readiness_interval_ms: env_or("READINESS_INTERVAL_MS", defaults.readiness_interval_ms),
            backend_connect_timeout_ms: env_or(
                "BACKEND_CONNECT_TIMEOUT_MS",
                defaults.backend_connect_timeout_ms,
            ),
            keep_alive_interval_seconds: env_or(
                "BACKEND_KEEPALIVE_INTERVAL_SECS",
                defaults.keep_alive_interval_seconds,
            ),
            keep_alive_timeout_seconds: env_or(
                "BACKEND_KEEPALIVE_TIMEOUT_SECS",
                defaults.keep_alive_timeout_seconds,
            ),
            health: HealthConfig::from_env(),
            tls: TlsConfig::from_env(),
        }
    }

    /// Configuration bound to loopback on ephemeral ports
    pub fn local_ephemeral() -> Self {
        Self {
            rpc_host: String::from("127.0.0.1"),
            rpc_port: 0,
            gateway_host: String::from("127.0.0.1"),
            gateway_port: 0,
            gateway_workers: 1,
            ..Default::default()
        }
    }

    /// Enable TLS on the RPC listener
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn rpc_bind_address(&self) -> String {
        format!("{}:{}", self.rpc_host, self.rpc_port)
    }

    pub fn gateway_bind_address(&self) -> String {
        format!("{}:{}", self.gateway_host, self.gateway_port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    pub fn gateway_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_shutdown_timeout_seconds)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_interval_ms)
    }

    pub fn backend_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_connect_timeout_ms)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval_seconds)
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_secs(self.keep_alive_timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.readiness_attempts == 0 {
            return Err("readiness attempts must be at least 1".to_string());
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        Ok(())
    }
}

/// Health service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthConfig {
    /// Timeout of the storage reachability probe in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Interval between status probes of a `Watch` stream in milliseconds
    #[serde(default = "default_watch_interval")]
    pub watch_interval_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout(),
            watch_interval_ms: default_watch_interval(),
        }
    }
}

impl HealthConfig {
    pub fn from_env() -> Self {
        Self {
            probe_timeout_ms: env_or("HEALTH_PROBE_TIMEOUT_MS", default_probe_timeout()),
            watch_interval_ms: env_or("HEALTH_WATCH_INTERVAL_MS", default_watch_interval()),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(1))
    }
}

/// TLS protocol versions accepted by the RPC listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum TlsVersion {
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

impl std::str::FromStr for TlsVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().trim_start_matches("tls").trim_start_matches('v') {
            "1.2" | "12" => Ok(TlsVersion::Tls12),
            "1.3" | "13" => Ok(TlsVersion::Tls13),
            other => Err(format!("Unsupported TLS version: {}", other)),
        }
    }
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsVersion::Tls12 => write!(f, "1.2"),
            TlsVersion::Tls13 => write!(f, "1.3"),
        }
    }
}

/// TLS configuration for the RPC listener
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain (PEM)
    pub cert_path: String,

    /// Path to private key (PEM)
    pub key_path: String,

    /// CA bundle the gateway uses to trust the RPC listener; defaults to `cert_path`
    #[serde(default)]
    pub ca_path: Option<String>,

    /// Server name the gateway expects in the listener's certificate
    #[serde(default = "default_server_name")]
    pub server_name: String,

    #[serde(default = "default_min_tls_version")]
    pub min_version: TlsVersion,

    #[serde(default = "default_max_tls_version")]
    pub max_version: TlsVersion,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: String::from("certs/server.crt"),
            key_path: String::from("certs/server.key"),
            ca_path: None,
            server_name: default_server_name(),
            min_version: default_min_tls_version(),
            max_version: default_max_tls_version(),
        }
    }
}

impl TlsConfig {
    /// TLS is enabled when both `TLS_CERT_PATH` and `TLS_KEY_PATH` are set
    pub fn from_env() -> Option<Self> {
        let cert_path = env_string("TLS_CERT_PATH")?;
        let key_path = env_string("TLS_KEY_PATH")?;
        Some(Self {
            cert_path,
            key_path,
            ca_path: env_string("TLS_CA_PATH"),
            server_name: env_string("TLS_SERVER_NAME").unwrap_or_else(default_server_name),
            min_version: env_or("TLS_MIN_VERSION", default_min_tls_version()),
            max_version: env_or("TLS_MAX_VERSION", default_max_tls_version()),
        })
    }

    pub fn new(cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            ..Default::default()
        }
    }

    /// Path of the CA bundle used by the gateway's backing channel
    pub fn trust_anchor_path(&self) -> &str {
        self.ca_path.as_deref().unwrap_or(&self.cert_path)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_version > self.max_version {
            return Err(format!(
                "TLS minimum version {} exceeds maximum version {}",
                self.min_version, self.max_version
            ));
        }
        Ok(())
    }
}

/// CORS configuration for the HTTP gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Allow credentials
    #[serde(default)]
    pub allow_credentials: bool,

    /// Max age for preflight cache in seconds
    #[serde(default = "default_max_age")]
    pub max_age: usize,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allow_credentials: false,
            max_age: default_max_age(),
        }
    }
}

impl CorsConfig {
    /// Create a permissive CORS configuration for development
    pub fn development() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
            max_age: 3600,
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

fn default_request_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_shutdown_grace() -> u64 {
    10
}

fn default_gateway_shutdown_timeout() -> u64 {
    5
}

fn default_readiness_attempts() -> u32 {
    50
}

fn default_readiness_interval() -> u64 {
    100
}

fn default_backend_connect_timeout() -> u64 {
    5_000
}

fn default_keep_alive_interval() -> u64 {
    30
}

fn default_keep_alive_timeout() -> u64 {
    10
}

fn default_probe_timeout() -> u64 {
    2_000
}

fn default_watch_interval() -> u64 {
    5_000
}

fn default_server_name() -> String {
    String::from("localhost")
}

fn default_min_tls_version() -> TlsVersion {
    TlsVersion::Tls12
}

fn default_max_tls_version() -> TlsVersion {
    TlsVersion::Tls13
}

fn default_max_age() -> usize {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_version_parsing() {
        assert_eq!("1.2".parse::<TlsVersion>().unwrap(), TlsVersion::Tls12);
        assert_eq!("TLSv1.3".parse::<TlsVersion>().unwrap(), TlsVersion::Tls13);
        assert!("1.1".parse::<TlsVersion>().is_err());
    }

    #[test]
    fn test_tls_version_range_validation() {
        let mut tls = TlsConfig::new("cert.pem", "key.pem");
        assert!(tls.validate().is_ok());
        tls.min_version = TlsVersion::Tls13;
        tls.max_version = TlsVersion::Tls12;
        assert!(tls.validate().is_err());
    }

    #[test]
    fn test_trust_anchor_defaults_to_certificate() {
        let tls = TlsConfig::new("cert.pem", "key.pem");
        assert_eq!(tls.trust_anchor_path(), "cert.pem");
    }

    #[test]
    fn test_zero_request_timeout_disables_deadline() {
        let config = ServerConfig {
            request_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.request_timeout().is_none());
        assert_eq!(
            ServerConfig::default().request_timeout(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_bind_addresses() {
        let config = ServerConfig::local_ephemeral();
        assert_eq!(config.rpc_bind_address(), "127.0.0.1:0");
        assert_eq!(config.gateway_bind_address(), "127.0.0.1:0");
    }
}
