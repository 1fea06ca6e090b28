//! authgate API layer
//!
//! Hosts the canonical gRPC service behind the request pipeline, the HTTP/JSON
//! gateway that forwards into it, and the lifecycle manager that starts and
//! stops both listeners.

pub mod app;
pub mod gateway;
pub mod middleware;
pub mod proto;
pub mod rpc;
pub mod server;
pub mod telemetry;

pub use app::Components;
pub use server::{run, start, start_with_components, start_with_storage, RunningServer};
