//! Runtime-tunable cache configuration.
//!
//! Every value is an atomic read at the moment an operation needs it, so a
//! setter takes effect on the very next call. Nothing snapshots these limits.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Default maximum age of a disk entry (one week).
pub const DEFAULT_MAX_DISK_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Shared tunables for the memory and disk tiers.
///
/// A limit of zero means "unlimited" for every size or count field; a zero
/// `max_disk_age` disables the age phase of reclamation.
#[derive(Debug)]
pub struct CacheConfig {
    max_memory_cost: AtomicU64,
    max_memory_count: AtomicU64,
    max_disk_age_ms: AtomicU64,
    max_disk_size: AtomicU64,
    cache_images_in_memory: AtomicBool,
    decompress_on_load: AtomicBool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_cost: AtomicU64::new(0),
            max_memory_count: AtomicU64::new(0),
            max_disk_age_ms: AtomicU64::new(DEFAULT_MAX_DISK_AGE.as_millis() as u64),
            max_disk_size: AtomicU64::new(0),
            cache_images_in_memory: AtomicBool::new(true),
            decompress_on_load: AtomicBool::new(true),
        }
    }
}

impl CacheConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum total cost of the memory tier.
    pub fn with_max_memory_cost(self, cost: u64) -> Self {
        self.set_max_memory_cost(cost);
        self
    }

    /// Set the maximum entry count of the memory tier.
    pub fn with_max_memory_count(self, count: u64) -> Self {
        self.set_max_memory_count(count);
        self
    }

    /// Set the maximum age of disk entries.
    pub fn with_max_disk_age(self, age: Duration) -> Self {
        self.set_max_disk_age(age);
        self
    }

    /// Set the maximum size of the disk namespace in bytes.
    pub fn with_max_disk_size(self, bytes: u64) -> Self {
        self.set_max_disk_size(bytes);
        self
    }

    /// Enable or disable the memory tier.
    pub fn with_cache_images_in_memory(self, enabled: bool) -> Self {
        self.set_cache_images_in_memory(enabled);
        self
    }

    /// Enable or disable eager decompression of disk hits.
    pub fn with_decompress_on_load(self, enabled: bool) -> Self {
        self.set_decompress_on_load(enabled);
        self
    }

    pub fn max_memory_cost(&self) -> u64 {
        self.max_memory_cost.load(Ordering::Relaxed)
    }

    pub fn set_max_memory_cost(&self, cost: u64) {
        self.max_memory_cost.store(cost, Ordering::Relaxed);
    }

    pub fn max_memory_count(&self) -> u64 {
        self.max_memory_count.load(Ordering::Relaxed)
    }

    pub fn set_max_memory_count(&self, count: u64) {
        self.max_memory_count.store(count, Ordering::Relaxed);
    }

    pub fn max_disk_age(&self) -> Duration {
        Duration::from_millis(self.max_disk_age_ms.load(Ordering::Relaxed))
    }

    pub fn set_max_disk_age(&self, age: Duration) {
        self.max_disk_age_ms
            .store(age.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn max_disk_size(&self) -> u64 {
        self.max_disk_size.load(Ordering::Relaxed)
    }

    pub fn set_max_disk_size(&self, bytes: u64) {
        self.max_disk_size.store(bytes, Ordering::Relaxed);
    }

    pub fn cache_images_in_memory(&self) -> bool {
        self.cache_images_in_memory.load(Ordering::Relaxed)
    }

    pub fn set_cache_images_in_memory(&self, enabled: bool) {
        self.cache_images_in_memory.store(enabled, Ordering::Relaxed);
    }

    pub fn decompress_on_load(&self) -> bool {
        self.decompress_on_load.load(Ordering::Relaxed)
    }

    pub fn set_decompress_on_load(&self, enabled: bool) {
        self.decompress_on_load.store(enabled, Ordering::Relaxed);
    }
}
