use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::metrics_consts::{SUPERVISOR_CONNECT_FAILED, SUPERVISOR_RESTARTS};

/// Keeps broker-facing routines alive: connection attempts are retried forever with a fixed
/// sleep between them, and a routine that fails is restarted from the same loop. Only the
/// shutdown signal ends either.
#[derive(Debug, Clone, Copy)]
pub struct Supervisor {
    retry_interval: Duration,
}

impl Supervisor {
    pub fn new(retry_interval: Duration) -> Self {
        Self { retry_interval }
    }

    /// Retry `connect` until it succeeds. Returns `None` if shutdown was requested first.
    pub async fn connect<T, E, F, Fut>(
        &self,
        name: &str,
        mut connect: F,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        loop {
            if *shutdown.borrow() {
                return None;
            }

            match connect().await {
                Ok(handle) => {
                    info!("{name}: connected");
                    return Some(handle);
                }
                Err(e) => {
                    warn!(
                        "{name}: connection failed, retrying in {:?}: {e}",
                        self.retry_interval
                    );
                    metrics::counter!(SUPERVISOR_CONNECT_FAILED, "name" => name.to_owned())
                        .increment(1);
                }
            }

            if !self.pause(shutdown).await {
                return None;
            }
        }
    }

    /// Run `routine` until shutdown, restarting it after a failure (or an unexpected clean
    /// exit). Each attempt receives its own copy of the shutdown signal.
    pub async fn run_supervised<E, F, Fut>(
        &self,
        name: &str,
        mut routine: F,
        mut shutdown: watch::Receiver<bool>,
    ) where
        F: FnMut(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match routine(shutdown.clone()).await {
                Ok(()) if *shutdown.borrow() => break,
                Ok(()) => warn!("{name}: exited without a shutdown request, restarting"),
                Err(e) => error!("{name}: failed, restarting in {:?}: {e}", self.retry_interval),
            }
            metrics::counter!(SUPERVISOR_RESTARTS, "name" => name.to_owned()).increment(1);

            if !self.pause(&mut shutdown).await {
                break;
            }
        }
        info!("{name}: stopped");
    }

    // Sleeps for the retry interval, returning false if shutdown was requested meanwhile.
    async fn pause(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.retry_interval) => !*shutdown.borrow(),
            _ = shutdown.changed() => false,
        }
    }
}

/// A shutdown signal flipped to `true` on SIGINT or SIGTERM.
pub fn shutdown_signal() -> std::io::Result<watch::Receiver<bool>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
        shutdown_tx.send_replace(true);
        // Keep the sender alive so receivers don't see a closed channel as a second signal
        shutdown_tx.closed().await;
    });

    Ok(shutdown_rx)
}
