//! Fetcher abstraction for retrieving remote payloads.
//!
//! The coordinator only ever talks to a [`Fetcher`]; [`HttpFetcher`] is the
//! reqwest-backed implementation used by the application and CLI. Tests plug
//! in scripted fetchers.
//!
//! Contract: a fetch reports progress zero or more times and then resolves
//! exactly once. Once the request's cancellation token fires the fetcher may
//! stop at any point; its result is discarded either way.

mod http;

pub use http::HttpFetcher;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by a fetcher.
///
/// `Clone` so one failure can fan out to every coalesced waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The identifier is not something the fetcher can request.
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// The request did not finish in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Could not reach the remote host.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The remote answered with a non-success status.
    #[error("HTTP {status} from {identifier}")]
    Status { status: u16, identifier: String },

    /// The remote answered successfully but sent no body.
    #[error("Empty response from {0}")]
    EmptyBody(String),

    /// The request was cancelled.
    #[error("Request cancelled")]
    Cancelled,

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Failures that say nothing about the resource itself.
    ///
    /// Transient failures are never recorded in the negative cache.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout(_) | FetchError::Connection(_) | FetchError::Cancelled
        )
    }
}

/// Transport hints forwarded unchanged from the load options.
///
/// The core attaches no behavior to these; a fetcher honors what it can.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub low_priority: bool,
    pub high_priority: bool,
    pub progressive: bool,
    pub refresh_cached: bool,
    pub continue_in_background: bool,
    pub handle_cookies: bool,
    pub allow_invalid_certificates: bool,
    pub scale_down_large_images: bool,
}

/// A progress report from an in-progress fetch.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Bytes received so far.
    pub received: u64,
    /// Total size if the remote announced it.
    pub expected: Option<u64>,
    /// Everything received so far; only set for progressive requests.
    pub partial: Option<Bytes>,
}

/// Callback receiving progress reports.
pub type ProgressSink = Arc<dyn Fn(Progress) + Send + Sync>;

/// One fetch request.
#[derive(Clone)]
pub struct FetchRequest {
    pub identifier: String,
    pub options: FetchOptions,
    pub progress: Option<ProgressSink>,
    pub cancel: CancellationToken,
}

impl FetchRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            options: FetchOptions::default(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Forward a progress report if anyone is listening.
    pub fn report(&self, progress: Progress) {
        if let Some(sink) = &self.progress {
            sink(progress);
        }
    }
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("identifier", &self.identifier)
            .field("options", &self.options)
            .field("has_progress", &self.progress.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Retrieves the raw bytes behind an identifier.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<Bytes, FetchError>>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<Bytes, FetchError>> {
        (**self).fetch(request)
    }
}
