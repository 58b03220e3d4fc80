//! Load error type.

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors delivered to a load's caller.
///
/// Storage failures never appear here; they are logged and treated as misses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The fetcher failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetched bytes could not be decoded.
    #[error("Failed to decode {identifier}: {reason}")]
    Decode { identifier: String, reason: String },

    /// The load was cancelled before it finished.
    #[error("Load cancelled")]
    Cancelled,

    /// The fetch veto hook declined the identifier.
    #[error("Fetch of {0} was declined")]
    Vetoed(String),

    /// The identifier is in the negative cache.
    #[error("{0} failed previously and is not retried")]
    PreviouslyFailed(String),

    /// The identifier is empty.
    #[error("Identifier is empty")]
    InvalidIdentifier,
}

impl LoadError {
    /// Errors that mean "nothing was attempted or the result was dropped",
    /// as opposed to a real failure of the resource.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            LoadError::Cancelled | LoadError::Vetoed(_) | LoadError::PreviouslyFailed(_)
        )
    }
}
