//! Termination signals and the cancellation of calls that outlive the drain

use tokio::sync::watch;
use tracing::{info, warn};

/// Raised once the drain grace period is over. Calls still running when it
/// fires give up instead of holding the listener open.
#[derive(Debug)]
pub struct Cancellation {
    sender: watch::Sender<bool>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn listener(&self) -> CancelListener {
        CancelListener {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`Cancellation`], cloned into every call
#[derive(Debug, Clone)]
pub struct CancelListener {
    receiver: watch::Receiver<bool>,
}

impl CancelListener {
    /// Resolves once cancellation is raised. Never resolves if the
    /// [`Cancellation`] is dropped without firing.
    pub async fn cancelled(&mut self) {
        let closed = self.receiver.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Resolves on SIGINT (Ctrl+C) or, on unix, SIGTERM
pub async fn signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listeners_wake_on_cancel() {
        let cancellation = Cancellation::new();
        let mut early = cancellation.listener();
        let waiter = tokio::spawn(async move { early.cancelled().await });

        cancellation.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        // Subscribing after the fact resolves immediately
        let mut late = cancellation.listener();
        tokio::time::timeout(Duration::from_millis(100), late.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_cancellation_never_fires() {
        let mut listener = Cancellation::new().listener();
        let fired = tokio::time::timeout(Duration::from_secs(60), listener.cancelled()).await;
        assert!(fired.is_err());
    }
}
