//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use webimage::app::AppError;
use webimage::cache::StorageError;
use webimage::config::ConfigFileError;
use webimage::load::LoadError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start the image stack
    AppStart(AppError),
    /// Failed to load an image
    Load(LoadError),
    /// Disk cache operation failed
    Cache(StorageError),
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
    /// Failed to encode a decoded image to the output file
    ImageWrite { path: String, reason: String },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Load(LoadError::PreviouslyFailed(_)) => {
                eprintln!();
                eprintln!("This address failed permanently before. Retry with --retry-failed.");
            }
            CliError::Cache(StorageError::LaneClosed) => {
                eprintln!();
                eprintln!("The cache shut down while the command was running.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::AppStart(e) => write!(f, "Failed to start: {}", e),
            CliError::Load(e) => write!(f, "Failed to load image: {}", e),
            CliError::Cache(e) => write!(f, "Cache error: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
            CliError::ImageWrite { path, reason } => {
                write!(f, "Failed to encode image to '{}': {}", path, reason)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::AppStart(e) => Some(e),
            CliError::Load(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::AppStart(e)
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        CliError::Load(e)
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        CliError::Cache(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}
