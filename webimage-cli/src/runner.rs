//! CLI runner for common setup and teardown.
//!
//! Loads `config.ini`, installs logging and starts one `WebImageApp` on a
//! runtime owned by the runner.

use tracing::info;
use webimage::app::{AppConfig, WebImageApp};
use webimage::config::ConfigFile;
use webimage::logging::{default_log_dir, default_log_file, init_logging, LoggingGuard};

use crate::error::CliError;

/// Runner that manages the CLI lifecycle.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    _logging_guard: LoggingGuard,
    config: ConfigFile,
    app: Option<WebImageApp>,
}

impl CliRunner {
    /// Load configuration and initialize logging.
    ///
    /// `verbose` mirrors log output to stderr.
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let logging_guard = init_logging(&default_log_dir(), default_log_file(), verbose)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
            app: None,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("WebImage v{}", env!("CARGO_PKG_VERSION"));
        info!("WebImage CLI: {} command", command);
    }

    /// Start the image stack, once.
    ///
    /// One-shot commands do not run the reclaim daemon; `cache reclaim`
    /// sweeps explicitly.
    pub fn app(&mut self) -> Result<&WebImageApp, CliError> {
        if self.app.is_none() {
            let config = AppConfig::from_config_file(&self.config).with_reclaim_interval(None);
            self.app = Some(WebImageApp::start_sync(config)?);
        }
        match &self.app {
            Some(app) => Ok(app),
            None => Err(CliError::Config("image stack did not start".to_string())),
        }
    }

    /// Stop the image stack, if it was started.
    pub fn finish(mut self) {
        if let Some(app) = self.app.take() {
            app.shutdown_sync();
        }
    }
}
