//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`cache`] - Disk cache management (stats, clear, reclaim, path)
//! - [`config`] - Configuration inspection (show, path, init)
//! - [`fetch`] - Load a single image through the cache

pub mod cache;
pub mod config;
pub mod fetch;
