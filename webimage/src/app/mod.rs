//! Application bootstrap and lifecycle.
//!
//! `WebImageApp` replaces any notion of a process-wide shared cache: it
//! builds one engine, one coordinator and one operation registry, owns the
//! reclaim daemon, and hands out references to them.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       WebImageApp                        │
//! │                                                          │
//! │  CacheEngine<RasterDecoder> ◄──── ReclaimDaemon          │
//! │        ▲                                                 │
//! │        │                                                 │
//! │  LoadCoordinator<RasterDecoder, HttpFetcher>             │
//! │                                                          │
//! │  OperationRegistry<LoadToken>                            │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::{AppLoader, WebImageApp};
pub use config::AppConfig;
pub use error::AppError;
