//! Loading images by identifier.
//!
//! [`LoadCoordinator`] ties the cache engine and a [`Fetcher`](crate::fetch::Fetcher)
//! together: it resolves identifiers to cache keys, answers from the cache
//! when it can, coalesces concurrent fetches for the same key, stores fresh
//! results back, and remembers identifiers that failed.
//!
//! # Example
//!
//! ```ignore
//! let coordinator = LoadCoordinator::new(engine, HttpFetcher::new()?, Handle::current());
//! let mut handle = coordinator.load("https://example.com/a.png", LoadOptions::default(), None);
//! while let Some(event) = handle.recv().await {
//!     if event.finished { /* display event.image */ }
//! }
//! ```

mod coordinator;
mod error;
mod event;
mod in_flight;
mod negative;
mod options;
mod token;

pub use coordinator::{KeyFilter, LoadCoordinator, LoadDelegate};
pub use error::LoadError;
pub use event::{LoadEvent, LoadHandle};
pub use negative::FailedIdentifiers;
pub use options::LoadOptions;
pub use token::LoadToken;
