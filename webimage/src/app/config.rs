//! Application configuration for `WebImageApp`.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{CacheConfig, DEFAULT_RECLAIM_INTERVAL};
use crate::config::{
    ConfigFile, DEFAULT_DISK_AGE_DAYS, DEFAULT_DISK_SIZE, DEFAULT_DOWNLOAD_TIMEOUT_SECS,
    DEFAULT_MEMORY_COST, DEFAULT_MEMORY_COUNT, DEFAULT_NAMESPACE,
};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Everything `WebImageApp::start` needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Root under which `com.webimage.<namespace>` is created.
    pub cache_dir: PathBuf,
    pub namespace: String,
    /// Extra directories searched, in order, after the primary namespace.
    pub read_only_roots: Vec<PathBuf>,
    pub memory_cost: u64,
    pub memory_count: u64,
    pub disk_size: u64,
    pub disk_age: Duration,
    pub in_memory: bool,
    pub decompress: bool,
    /// Interval of the reclaim daemon. `None` disables it.
    pub reclaim_interval: Option<Duration>,
    pub download_timeout: Duration,
}

impl AppConfig {
    /// Defaults rooted at `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            read_only_roots: Vec::new(),
            memory_cost: DEFAULT_MEMORY_COST,
            memory_count: DEFAULT_MEMORY_COUNT,
            disk_size: DEFAULT_DISK_SIZE,
            disk_age: Duration::from_secs(DEFAULT_DISK_AGE_DAYS * SECS_PER_DAY),
            in_memory: true,
            decompress: true,
            reclaim_interval: Some(DEFAULT_RECLAIM_INTERVAL),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        }
    }

    /// Translate a loaded `config.ini`.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let cache = &config.cache;
        Self {
            cache_dir: cache.directory.clone(),
            namespace: cache.namespace.clone(),
            read_only_roots: Vec::new(),
            memory_cost: cache.memory_cost,
            memory_count: cache.memory_count,
            disk_size: cache.disk_size,
            disk_age: Duration::from_secs(cache.disk_age_days.saturating_mul(SECS_PER_DAY)),
            in_memory: cache.in_memory,
            decompress: cache.decompress,
            reclaim_interval: (cache.gc_interval > 0)
                .then(|| Duration::from_secs(cache.gc_interval)),
            download_timeout: Duration::from_secs(config.download.timeout),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_read_only_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.read_only_roots.push(root.into());
        self
    }

    pub fn with_memory_cost(mut self, cost: u64) -> Self {
        self.memory_cost = cost;
        self
    }

    pub fn with_disk_size(mut self, bytes: u64) -> Self {
        self.disk_size = bytes;
        self
    }

    pub fn with_reclaim_interval(mut self, interval: Option<Duration>) -> Self {
        self.reclaim_interval = interval;
        self
    }

    /// Runtime-tunable cache limits derived from this config.
    pub(crate) fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_max_memory_cost(self.memory_cost)
            .with_max_memory_count(self.memory_count)
            .with_max_disk_size(self.disk_size)
            .with_max_disk_age(self.disk_age)
            .with_cache_images_in_memory(self.in_memory)
            .with_decompress_on_load(self.decompress)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.namespace.is_empty() {
            return Err("cache namespace is empty".to_string());
        }
        if self.download_timeout.is_zero() {
            return Err("download timeout must be positive".to_string());
        }
        Ok(())
    }
}
