//! Application bootstrap implementation.

use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};
use tracing::info;

use super::config::AppConfig;
use super::error::AppError;
use crate::cache::{CacheEngine, ReclaimDaemon};
use crate::decode::RasterDecoder;
use crate::fetch::HttpFetcher;
use crate::load::{LoadCoordinator, LoadToken};
use crate::operation::OperationRegistry;

/// Coordinator type wired by [`WebImageApp`].
pub type AppLoader = LoadCoordinator<RasterDecoder, HttpFetcher>;

/// One explicitly owned image-loading stack.
///
/// Startup order:
/// 1. Cache engine (opens the namespace, registers overlays)
/// 2. Reclaim daemon, if enabled
/// 3. HTTP fetcher and load coordinator
/// 4. Operation registry for callers that track loads per owner
///
/// # Example
///
/// ```ignore
/// use webimage::app::{AppConfig, WebImageApp};
///
/// let app = WebImageApp::start(AppConfig::new(cache_dir)).await?;
/// let event = app.loader().load(url, LoadOptions::default(), None).wait().await;
/// app.shutdown().await;
/// ```
pub struct WebImageApp {
    engine: Arc<CacheEngine<RasterDecoder>>,
    loader: AppLoader,
    operations: Arc<OperationRegistry<LoadToken>>,
    reclaim: Option<ReclaimDaemon>,
    config: AppConfig,
    runtime_handle: Handle,
    /// Present when created via `start_sync()`.
    runtime: Option<Runtime>,
}

impl WebImageApp {
    /// Start on the current Tokio runtime.
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        Self::start_internal(config, Handle::current())
    }

    /// Start on a dedicated runtime owned by the returned app.
    ///
    /// For callers outside any async context, such as CLI commands.
    pub fn start_sync(config: AppConfig) -> Result<Self, AppError> {
        let runtime = Runtime::new().map_err(|e| AppError::RuntimeCreation(e.to_string()))?;

        let mut app = {
            let _guard = runtime.enter();
            Self::start_internal(config, runtime.handle().clone())?
        };
        app.runtime = Some(runtime);
        Ok(app)
    }

    fn start_internal(config: AppConfig, runtime_handle: Handle) -> Result<Self, AppError> {
        config.validate().map_err(AppError::Config)?;
        info!(
            directory = %config.cache_dir.display(),
            namespace = %config.namespace,
            "Starting WebImageApp"
        );

        let engine = CacheEngine::open(
            &config.cache_dir,
            &config.namespace,
            RasterDecoder,
            Arc::new(config.cache_config()),
        )?;
        for root in &config.read_only_roots {
            engine.add_read_only_root(root.clone());
        }
        let engine = Arc::new(engine);
        info!(
            path = %engine.disk().primary_root().display(),
            overlays = config.read_only_roots.len(),
            "Cache engine ready"
        );

        let reclaim = config.reclaim_interval.map(|interval| {
            ReclaimDaemon::spawn_on(&runtime_handle, Arc::clone(&engine), interval)
        });

        let fetcher = HttpFetcher::with_timeout(config.download_timeout)?;
        let loader = LoadCoordinator::new(Arc::clone(&engine), fetcher, runtime_handle.clone());

        Ok(Self {
            engine,
            loader,
            operations: Arc::new(OperationRegistry::new()),
            reclaim,
            config,
            runtime_handle,
            runtime: None,
        })
    }

    pub fn engine(&self) -> &Arc<CacheEngine<RasterDecoder>> {
        &self.engine
    }

    pub fn loader(&self) -> &AppLoader {
        &self.loader
    }

    pub fn operations(&self) -> Arc<OperationRegistry<LoadToken>> {
        Arc::clone(&self.operations)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runtime the app's tasks run on.
    pub fn runtime_handle(&self) -> Handle {
        self.runtime_handle.clone()
    }

    pub fn is_reclaim_running(&self) -> bool {
        self.reclaim.as_ref().is_some_and(ReclaimDaemon::is_running)
    }

    /// Cancel outstanding loads, stop the reclaim daemon and wait for queued
    /// disk writes to land.
    pub async fn shutdown(mut self) {
        info!("Shutting down WebImageApp");

        self.loader.cancel_all();
        if let Some(reclaim) = self.reclaim.take() {
            reclaim.shutdown().await;
        }
        self.engine.flush_disk().await;

        info!("WebImageApp shutdown complete");
    }

    /// Blocking shutdown for apps created with `start_sync()`.
    ///
    /// The owned runtime is released only after the async shutdown finished,
    /// outside of any async context.
    pub fn shutdown_sync(mut self) {
        let runtime = self.runtime.take();
        let handle = self.runtime_handle.clone();
        handle.block_on(self.shutdown());
        drop(runtime);
    }
}
