//! The RPC listener

use std::io;
use std::time::Duration;

use ag_shared::config::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::Server;
use tracing::{debug, warn};

use crate::app::Components;
use crate::proto::auth_service_server::AuthServiceServer;
use crate::proto::health_server::HealthServer;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const PENDING_HANDSHAKES: usize = 64;

pub type RpcTask = JoinHandle<Result<(), tonic::transport::Error>>;

/// Serve both RPC services on `listener` behind the request pipeline until
/// `shutdown` fires, then drain in-flight calls
pub fn spawn(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    components: &Components,
    config: &ServerConfig,
    shutdown: oneshot::Receiver<()>,
) -> RpcTask {
    let router = Server::builder()
        .http2_keepalive_interval(Some(config.keep_alive_interval()))
        .http2_keepalive_timeout(Some(config.keep_alive_timeout()))
        .layer(components.pipeline())
        .add_service(AuthServiceServer::new(components.auth_rpc()))
        .add_service(HealthServer::new(components.health_rpc()));

    let signal = async {
        // A dropped sender counts as a shutdown request too
        let _ = shutdown.await;
    };

    match tls {
        None => tokio::spawn(
            router.serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal),
        ),
        Some(acceptor) => tokio::spawn(
            router.serve_with_incoming_shutdown(tls_incoming(listener, acceptor), signal),
        ),
    }
}

/// Accept TCP connections and complete the TLS handshake off the accept loop.
/// The loop ends once the server stops polling for connections.
fn tls_incoming(
    listener: TcpListener,
    acceptor: TlsAcceptor,
) -> ReceiverStream<io::Result<TlsStream<TcpStream>>> {
    let (tx, rx) = mpsc::channel(PENDING_HANDSHAKES);

    tokio::spawn(async move {
        loop {
            let (stream, peer) = tokio::select! {
                _ = tx.closed() => break,
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(error = %err, "rpc accept failed");
                        continue;
                    }
                },
            };

            let acceptor = acceptor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                    Ok(Ok(tls)) => {
                        let _ = tx.send(Ok(tls)).await;
                    }
                    Ok(Err(err)) => debug!(%peer, error = %err, "TLS handshake failed"),
                    Err(_) => debug!(%peer, "TLS handshake timed out"),
                }
            });
        }
    });

    ReceiverStream::new(rx)
}
