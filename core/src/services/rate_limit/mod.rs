//! Per-client admission control
//!
//! Buckets are local to the process. Nothing here is shared across instances
//! of a horizontally scaled deployment.

mod sliding_window;


use async_trait::async_trait;

pub use sliding_window::SlidingWindowRateLimiter;

/// Bucket used when a caller sends no identifying signal at all
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Admission decision for one call from one client
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Returns `true` and records the call when the client is under its limit
    async fn allow(&self, client_id: &str) -> bool;
}
