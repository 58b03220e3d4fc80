//! Settings structs and their defaults.
//!
//! Each struct is one `[section]` of `config.ini`.

use std::path::PathBuf;

/// Default memory-tier cost limit (256MB of decoded pixels).
pub const DEFAULT_MEMORY_COST: u64 = 256 * 1024 * 1024;

/// Default memory-tier entry limit (0 = unlimited).
pub const DEFAULT_MEMORY_COUNT: u64 = 0;

/// Default disk-tier size limit (1GB).
pub const DEFAULT_DISK_SIZE: u64 = 1024 * 1024 * 1024;

/// Default maximum age of disk entries, in days.
pub const DEFAULT_DISK_AGE_DAYS: u64 = 7;

/// Default interval between reclaim passes, in seconds.
pub const DEFAULT_GC_INTERVAL_SECS: u64 = 60;

/// Default HTTP timeout, in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 15;

/// Default disk namespace.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Platform cache directory for webimage (`~/.cache/webimage` on Linux).
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("webimage")
}

/// Complete configuration loaded from `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub download: DownloadSettings,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Root under which the namespace directory is created.
    pub directory: PathBuf,
    pub namespace: String,
    /// Memory-tier cost limit in bytes (0 = unlimited).
    pub memory_cost: u64,
    /// Memory-tier entry limit (0 = unlimited).
    pub memory_count: u64,
    /// Disk-tier size limit in bytes (0 = unlimited).
    pub disk_size: u64,
    /// Disk entry lifetime in days (0 = keep forever).
    pub disk_age_days: u64,
    pub in_memory: bool,
    pub decompress: bool,
    /// Seconds between background reclaim passes (0 = no daemon).
    pub gc_interval: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            memory_cost: DEFAULT_MEMORY_COST,
            memory_count: DEFAULT_MEMORY_COUNT,
            disk_size: DEFAULT_DISK_SIZE,
            disk_age_days: DEFAULT_DISK_AGE_DAYS,
            in_memory: true,
            decompress: true,
            gc_interval: DEFAULT_GC_INTERVAL_SECS,
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// HTTP timeout in seconds.
    pub timeout: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}
