//! The gateway's single connection to the RPC listener

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use ag_shared::config::ServerConfig;
use anyhow::Context;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tracing::{info, warn};

/// Where to dial a listener that may be bound to the unspecified address
pub(crate) fn dial_address(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port()),
        IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(Ipv6Addr::LOCALHOST.into(), addr.port()),
        _ => addr,
    }
}

/// Connect to the RPC listener at `rpc_addr`.
///
/// tonic channels never retry a call, which keeps non-idempotent RPCs such
/// as SignUp from running twice. If the first connect fails the channel is
/// returned lazy and reconnects on first use.
pub async fn backing_channel(rpc_addr: SocketAddr, config: &ServerConfig) -> anyhow::Result<Channel> {
    let target = dial_address(rpc_addr);
    let scheme = if config.is_tls_enabled() { "https" } else { "http" };

    let mut endpoint = Endpoint::from_shared(format!("{scheme}://{target}"))?
        .connect_timeout(config.backend_connect_timeout())
        .http2_keep_alive_interval(config.keep_alive_interval())
        .keep_alive_timeout(config.keep_alive_timeout())
        .keep_alive_while_idle(true);

    if let Some(tls) = &config.tls {
        let pem = tokio::fs::read(tls.trust_anchor_path())
            .await
            .with_context(|| format!("reading trust anchor {}", tls.trust_anchor_path()))?;
        endpoint = endpoint.tls_config(
            ClientTlsConfig::new()
                .ca_certificate(Certificate::from_pem(pem))
                .domain_name(tls.server_name.clone()),
        )?;
    }

    match endpoint.connect().await {
        Ok(channel) => {
            info!(%target, "backing channel connected");
            Ok(channel)
        }
        Err(err) => {
            warn!(%target, error = %err, "backing channel not connected yet, will retry lazily");
            Ok(endpoint.connect_lazy())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dial_address_replaces_unspecified() {
        let v4: SocketAddr = "0.0.0.0:50051".parse().unwrap();
        assert_eq!(dial_address(v4), "127.0.0.1:50051".parse().unwrap());

        let v6: SocketAddr = "[::]:50051".parse().unwrap();
        assert_eq!(dial_address(v6), "[::1]:50051".parse().unwrap());

        let concrete: SocketAddr = "10.1.2.3:50051".parse().unwrap();
        assert_eq!(dial_address(concrete), concrete);
    }
}
