//! Periodic disk reclamation.
//!
//! The daemon owns its task and shuts down through a `CancellationToken`.
//! Each cycle calls [`CacheEngine::reclaim_old`], so limits changed in the
//! shared [`CacheConfig`](super::CacheConfig) apply on the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::engine::CacheEngine;
use crate::decode::ImageDecoder;

/// Default interval between reclaim cycles.
pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(60);

/// Background task running `reclaim_old` on an interval.
pub struct ReclaimDaemon {
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ReclaimDaemon {
    /// Spawn the daemon on the current Tokio runtime.
    ///
    /// One cycle runs immediately, then one every `interval`.
    pub fn spawn<D: ImageDecoder>(engine: Arc<CacheEngine<D>>, interval: Duration) -> Self {
        Self::spawn_on(&tokio::runtime::Handle::current(), engine, interval)
    }

    /// Spawn the daemon on a specific runtime.
    pub fn spawn_on<D: ImageDecoder>(
        runtime: &tokio::runtime::Handle,
        engine: Arc<CacheEngine<D>>,
        interval: Duration,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let handle = runtime.spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                "Disk cache reclaim daemon started"
            );

            loop {
                let result = engine.reclaim_old().await;
                debug!(%result, "Reclaim cycle finished");

                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Disk cache reclaim daemon shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the daemon and wait for the current cycle to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ReclaimDaemon {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
