//! gRPC service implementations backed by the core services

mod auth;
mod convert;
mod health;
pub mod status;

pub use auth::AuthRpc;
pub use health::HealthRpc;
pub use status::into_status;
