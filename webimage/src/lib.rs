//! WebImage - two-tier image cache with coalesced remote loading
//!
//! The library is built from five parts:
//!
//! - [`cache`]: a bounded memory LRU and a disk store with a serialized I/O
//!   lane, read-only overlays and age/size reclamation, composed by
//!   [`cache::CacheEngine`]
//! - [`load`]: the [`load::LoadCoordinator`], which answers from the cache,
//!   coalesces concurrent fetches and remembers failures
//! - [`operation`]: per-owner tracking that cancels stale requests
//! - [`fetch`] and [`decode`]: the network and image collaborators
//! - [`app`]: wiring of all of the above into one owned instance
//!
//! # Example
//!
//! ```no_run
//! use webimage::app::{AppConfig, WebImageApp};
//! use webimage::load::LoadOptions;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let app = WebImageApp::start(AppConfig::new("/tmp/webimage")).await?;
//! let event = app
//!     .loader()
//!     .load("https://example.com/logo.png", LoadOptions::default(), None)
//!     .wait()
//!     .await;
//! if let Some(image) = event.and_then(|e| e.image) {
//!     println!("{}x{}", image.width(), image.height());
//! }
//! app.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod cache;
pub mod config;
pub mod decode;
pub mod fetch;
pub mod load;
pub mod logging;
pub mod operation;

pub use cache::{CacheEngine, CacheKey, CacheSource};
pub use load::{LoadCoordinator, LoadEvent, LoadHandle, LoadOptions, LoadToken};
pub use operation::{OperationRegistry, OwnerId};
