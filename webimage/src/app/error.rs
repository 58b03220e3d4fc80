//! Application error types.

use std::fmt;

use crate::cache::StorageError;
use crate::fetch::FetchError;

/// Errors that can occur while starting the application.
#[derive(Debug)]
pub enum AppError {
    /// The disk cache could not be opened.
    Storage(StorageError),

    /// The HTTP fetcher could not be created.
    Fetcher(FetchError),

    /// Configuration error.
    Config(String),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Storage(e) => write!(f, "Failed to open disk cache: {}", e),
            AppError::Fetcher(e) => write!(f, "Failed to create fetcher: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Storage(e) => Some(e),
            AppError::Fetcher(e) => Some(e),
            AppError::Config(_) | AppError::RuntimeCreation(_) => None,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::Storage(e)
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        AppError::Fetcher(e)
    }
}
