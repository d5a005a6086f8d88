//! Shutdown signalling
//!
//! An interrupt is honored at the next scheduling step: before a cycle,
//! before each strategy launch, and during any sleep. A job that is already
//! running is left to finish or hit its timeout.

use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Sender side, owned by whoever listens for OS signals
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiver side, cloned into the scheduler
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected trigger/signal pair
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    pub fn request_shutdown(&self) {
        if self.tx.send_replace(true) {
            warn!("Shutdown already requested");
            return;
        }
        info!("Shutdown requested");
    }
}

impl ShutdownSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|requested| *requested).await.is_err() {
            // Trigger dropped without firing: nothing will ever request shutdown.
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration` unless shutdown arrives first. Returns `false` when interrupted.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_requested() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.wait() => false,
        }
    }
}

/// Fire `trigger` on SIGINT or SIGTERM
pub async fn listen_for_signals(trigger: ShutdownTrigger) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    trigger.request_shutdown();
}
