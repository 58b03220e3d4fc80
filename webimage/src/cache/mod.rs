//! Two-tier image cache.
//!
//! Provides a bounded in-memory LRU tier and a durable disk tier with a
//! serialized I/O lane, read-only overlays and age/size reclamation, composed
//! by [`CacheEngine`].

mod config;
mod daemon;
mod disk;
mod engine;
mod error;
mod memory;
mod path;
mod reclaim;
mod types;

pub use config::{CacheConfig, DEFAULT_MAX_DISK_AGE};
pub use daemon::{ReclaimDaemon, DEFAULT_RECLAIM_INTERVAL};
pub use disk::{Completion, DiskStore};
pub use engine::{CacheEngine, Lookup, QueryHandle};
pub use error::StorageError;
pub use memory::{MemoryCache, MemoryStats};
pub use path::{cache_file_name, namespace_dir, path_in_root, NAMESPACE_PREFIX};
pub use reclaim::{reclaim_blocking, RECLAIM_TARGET_FRACTION};
pub use types::{CacheKey, CacheSource, DiskStats, ReclaimResult};
