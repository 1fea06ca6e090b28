//! Startup readiness polling for the RPC listener

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Poll `addr` until it accepts a TCP connection, at most `attempts` times,
/// `interval` apart. Returns whether the listener answered.
pub async fn wait_until_accepting(addr: SocketAddr, attempts: u32, interval: Duration) -> bool {
    for attempt in 1..=attempts.max(1) {
        match timeout(interval, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => {
                debug!(%addr, attempt, "rpc listener accepting connections");
                return true;
            }
            Ok(Err(err)) => debug!(%addr, attempt, error = %err, "rpc listener not ready"),
            Err(_) => debug!(%addr, attempt, "readiness probe timed out"),
        }
        sleep(interval).await;
    }
    false
}
