//! Lifecycle manager for the two listeners.
//!
//! Startup binds the RPC listener, waits until it accepts connections and
//! only then starts the gateway. Shutdown runs in the opposite direction:
//! the RPC side drains first, then the gateway stops, then storage closes.

mod readiness;
mod rpc;
pub mod shutdown;
pub mod tls;

use std::net::SocketAddr;
use std::time::Duration;

use ag_infra::Storage;
use ag_shared::config::AppConfig;
use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::app::Components;
use crate::gateway::{self, backing_channel, dial_address, GatewayServer, GatewayState};

pub use readiness::wait_until_accepting;

/// How long cancelled calls get to flush their responses before the RPC
/// listener is torn down
const CANCEL_FLUSH: Duration = Duration::from_secs(1);

/// Both listeners and the background jobs of one process
pub struct RunningServer {
    rpc_addr: SocketAddr,
    rpc_shutdown: Option<oneshot::Sender<()>>,
    rpc_task: rpc::RpcTask,
    gateway: GatewayServer,
    background: Vec<JoinHandle<()>>,
    components: Components,
}

impl RunningServer {
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    pub fn gateway_addr(&self) -> SocketAddr {
        self.gateway.addr
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Stop accepting RPC calls and drain the in-flight ones within the
    /// grace period, stop the gateway within its own timeout, stop the
    /// background jobs and release storage.
    ///
    /// Calls still running when the grace period ends are answered with
    /// `Unavailable` and open watch streams are closed.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        let server = &self.components.config().server;
        let grace = server.shutdown_grace();
        let gateway_timeout = server.gateway_shutdown_timeout();

        info!(grace_secs = grace.as_secs(), "draining rpc listener");
        if let Some(signal) = self.rpc_shutdown.take() {
            let _ = signal.send(());
        }
        match timeout(grace, &mut self.rpc_task).await {
            Ok(Ok(Ok(()))) => info!("rpc listener drained"),
            Ok(Ok(Err(err))) => warn!(error = %err, "rpc listener stopped with an error"),
            Ok(Err(err)) => warn!(error = %err, "rpc listener task failed"),
            Err(_) => {
                warn!("drain grace period elapsed, cancelling remaining calls");
                self.components.cancel_in_flight();
                if timeout(CANCEL_FLUSH, &mut self.rpc_task).await.is_err() {
                    warn!("rpc listener still busy after cancellation, aborting");
                    self.rpc_task.abort();
                }
            }
        }

        info!("stopping gateway");
        if timeout(gateway_timeout, self.gateway.handle.stop(true)).await.is_err() {
            warn!("gateway did not stop in time");
        }
        match timeout(gateway_timeout, &mut self.gateway.task).await {
            Ok(Ok(Ok(()))) => info!("gateway stopped"),
            Ok(Ok(Err(err))) => warn!(error = %err, "gateway stopped with an error"),
            Ok(Err(err)) => warn!(error = %err, "gateway task failed"),
            Err(_) => self.gateway.task.abort(),
        }

        for task in self.background.drain(..) {
            task.abort();
        }

        self.components.storage.close().await;
        info!("shutdown complete");
        Ok(())
    }
}

/// Connect storage as configured and start both listeners
pub async fn start(config: &AppConfig) -> anyhow::Result<RunningServer> {
    let storage = Storage::connect(&config.database)
        .await
        .context("connecting storage")?;
    start_with_storage(config, storage).await
}

/// Start both listeners over an already opened storage backend
pub async fn start_with_storage(config: &AppConfig, storage: Storage) -> anyhow::Result<RunningServer> {
    let components = Components::build(config, storage).context("building services")?;
    start_with_components(components).await
}

/// Start both listeners over an already built service graph
pub async fn start_with_components(components: Components) -> anyhow::Result<RunningServer> {
    let config = components.config().clone();
    let server = &config.server;
    let acceptor = server.tls.as_ref().map(tls::acceptor).transpose()?;

    let listener = TcpListener::bind(server.rpc_bind_address())
        .await
        .with_context(|| format!("binding rpc listener on {}", server.rpc_bind_address()))?;
    let rpc_addr = listener.local_addr()?;

    let (rpc_shutdown, signal) = oneshot::channel();
    let rpc_task = rpc::spawn(listener, acceptor, &components, server, signal);
    info!(addr = %rpc_addr, tls = server.is_tls_enabled(), "rpc listener started");

    let ready = wait_until_accepting(
        dial_address(rpc_addr),
        server.readiness_attempts,
        server.readiness_interval(),
    )
    .await;
    if !ready {
        warn!(
            addr = %rpc_addr,
            attempts = server.readiness_attempts,
            "rpc listener not ready, starting gateway anyway"
        );
    }

    let gateway = async {
        let channel = backing_channel(rpc_addr, server).await?;
        let state = GatewayState::new(channel, components.registry.clone());
        gateway::spawn(server, &config.cors, state).context("starting gateway")
    }
    .await;
    let gateway = match gateway {
        Ok(gateway) => gateway,
        Err(err) => {
            let _ = rpc_shutdown.send(());
            rpc_task.abort();
            return Err(err);
        }
    };

    let background = components.start_background_tasks();

    Ok(RunningServer {
        rpc_addr,
        rpc_shutdown: Some(rpc_shutdown),
        rpc_task,
        gateway,
        background,
        components,
    })
}

/// Run until SIGINT or SIGTERM, then shut down in order
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let running = start(&config).await?;
    info!(
        rpc = %running.rpc_addr(),
        gateway = %running.gateway_addr(),
        "authgate ready"
    );

    shutdown::signal().await;
    running.shutdown().await
}
