//! HTTP/JSON gateway.
//!
//! Business routes forward into the RPC listener over one shared backing
//! channel, so every call passes the same request pipeline as native gRPC
//! callers. `/healthz` and `/metrics` answer locally.

mod client;
pub mod cors;
pub mod dto;
pub mod error;
pub mod handlers;

use std::io;
use std::net::SocketAddr;

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpServer};
use ag_shared::config::{CorsConfig, ServerConfig};
use prometheus::Registry;
use tokio::task::JoinHandle;
use tonic::transport::Channel;
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::proto::auth_service_client::AuthServiceClient;
use crate::proto::health_client::HealthClient;

pub use client::backing_channel;
pub(crate) use client::dial_address;
pub use error::GatewayError;

const MAX_JSON_BYTES: usize = 64 * 1024;

/// Shared by every gateway worker. Clients are cheap clones of one channel.
#[derive(Clone)]
pub struct GatewayState {
    pub auth: AuthServiceClient<Channel>,
    pub health: HealthClient<Channel>,
    pub registry: Registry,
}

impl GatewayState {
    pub fn new(channel: Channel, registry: Registry) -> Self {
        Self {
            auth: AuthServiceClient::new(channel.clone()),
            health: HealthClient::new(channel),
            registry,
        }
    }
}

/// Gateway routes, body limits and extractor error handling
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(MAX_JSON_BYTES)
            .error_handler(handlers::json_error),
    )
    .app_data(web::QueryConfig::default().error_handler(handlers::query_error))
    .route("/healthz", web::get().to(handlers::liveness))
    .route("/metrics", web::get().to(handlers::metrics))
    .service(
        web::scope("/api/v1")
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(handlers::sign_up))
                    .route("/signin", web::post().to(handlers::sign_in))
                    .route("/signout", web::post().to(handlers::sign_out))
                    .route("/refresh", web::post().to(handlers::refresh))
                    .route("/revoke", web::post().to(handlers::revoke))
                    .route("/validate", web::post().to(handlers::validate)),
            )
            .route("/users", web::get().to(handlers::list_users))
            .route("/health", web::get().to(handlers::health)),
    );
}

/// A running gateway listener
pub struct GatewayServer {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    pub task: JoinHandle<io::Result<()>>,
}

/// Bind and start the gateway. Signal handling stays with the lifecycle
/// manager, which stops the gateway through its handle.
pub fn spawn(server: &ServerConfig, cors: &CorsConfig, state: GatewayState) -> io::Result<GatewayServer> {
    let state = web::Data::new(state);
    let cors = cors.clone();

    let mut http = HttpServer::new(move || {
        App::new()
            .wrap(cors::create_cors(&cors))
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(configure)
            .default_service(web::route().to(handlers::not_found))
    })
    .disable_signals()
    .shutdown_timeout(server.gateway_shutdown_timeout().as_secs());

    if server.gateway_workers > 0 {
        http = http.workers(server.gateway_workers);
    }

    let http = http.bind(server.gateway_bind_address())?;
    let addr = http
        .addrs()
        .first()
        .copied()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "gateway bound no address"))?;

    let running = http.run();
    let handle = running.handle();
    let task = tokio::spawn(running);
    info!(%addr, "gateway listening");

    Ok(GatewayServer { addr, handle, task })
}
