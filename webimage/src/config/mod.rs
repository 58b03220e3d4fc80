//! Persistent configuration (`~/.webimage/config.ini`).
//!
//! # Example
//!
//! ```
//! use webimage::config::{ConfigFile, DEFAULT_NAMESPACE};
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.cache.namespace, DEFAULT_NAMESPACE);
//! assert!(config.cache.in_memory);
//! ```

mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    default_cache_directory, CacheSettings, ConfigFile, DownloadSettings, DEFAULT_DISK_AGE_DAYS,
    DEFAULT_DISK_SIZE, DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_GC_INTERVAL_SECS,
    DEFAULT_MEMORY_COST, DEFAULT_MEMORY_COUNT, DEFAULT_NAMESPACE,
};
pub use size::{format_size, parse_size, Size, SizeParseError};
