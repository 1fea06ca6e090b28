//! rustls configuration for the RPC listener

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use ag_shared::config::{TlsConfig, TlsVersion};
use anyhow::{anyhow, Context};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::SupportedProtocolVersion;
use tokio_rustls::TlsAcceptor;
use tracing::info;

/// AEAD suites with forward secrecy only
fn cipher_suites() -> Vec<rustls::SupportedCipherSuite> {
    use rustls::crypto::ring::cipher_suite::*;

    vec![
        TLS13_AES_256_GCM_SHA384,
        TLS13_AES_128_GCM_SHA256,
        TLS13_CHACHA20_POLY1305_SHA256,
        TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
        TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
    ]
}

/// Protocol versions between `min` and `max`, inclusive
pub fn protocol_versions(min: TlsVersion, max: TlsVersion) -> Vec<&'static SupportedProtocolVersion> {
    [
        (TlsVersion::Tls12, &rustls::version::TLS12),
        (TlsVersion::Tls13, &rustls::version::TLS13),
    ]
    .into_iter()
    .filter(|(version, _)| (min..=max).contains(version))
    .map(|(_, supported)| supported)
    .collect()
}

fn load_certs(path: &str) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("opening certificate {path}"))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing certificate {path}"))?;
    if certs.is_empty() {
        return Err(anyhow!("no certificates found in {path}"));
    }
    Ok(certs)
}

fn load_key(path: &str) -> anyhow::Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("opening private key {path}"))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("parsing private key {path}"))?
        .ok_or_else(|| anyhow!("no private key found in {path}"))
}

/// Build the acceptor for the RPC listener. No client authentication.
pub fn acceptor(config: &TlsConfig) -> anyhow::Result<TlsAcceptor> {
    config.validate().map_err(|err| anyhow!(err))?;

    // The gateway's tonic client uses the process-wide default provider
    let _ = ring::default_provider().install_default();

    let provider = CryptoProvider {
        cipher_suites: cipher_suites(),
        ..ring::default_provider()
    };
    let versions = protocol_versions(config.min_version, config.max_version);

    let mut server = rustls::ServerConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(&versions)
        .context("unsupported TLS protocol range")?
        .with_no_client_auth()
        .with_single_cert(load_certs(&config.cert_path)?, load_key(&config.key_path)?)
        .context("building TLS server config")?;
    server.alpn_protocols = vec![b"h2".to_vec()];

    info!(
        min_version = %config.min_version,
        max_version = %config.max_version,
        "TLS enabled on rpc listener"
    );

    Ok(TlsAcceptor::from(Arc::new(server)))
}
