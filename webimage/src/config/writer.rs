//! INI serialization: `ConfigFile` → commented INI string.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Render `config` as the commented INI written to `config.ini`.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let cache = &config.cache;
    format!(
        r#"[cache]
; Root directory for the disk cache. Entries live in <directory>/com.webimage.<namespace>/
; Example: directory = ~/.cache/webimage
directory = {}
; Namespace of the primary disk cache (default: default)
namespace = {}
; Memory cache cost limit in decoded bytes, 0 = unlimited (default: 256MB)
; Supports: KB, MB, GB suffixes
memory_cost = {}
; Memory cache entry limit, 0 = unlimited (default: 0)
memory_count = {}
; Disk cache size limit, 0 = unlimited (default: 1GB)
; When exceeded, the oldest files are removed until half the limit is reached
disk_size = {}
; Days before a disk entry expires, 0 = never (default: 7)
disk_age_days = {}
; Keep decoded images in memory (default: true)
in_memory = {}
; Decode images to display-ready form when loading from disk (default: true)
decompress = {}
; Seconds between background disk reclaim passes, 0 = disabled (default: 60)
gc_interval = {}

[download]
; Timeout in seconds for HTTP requests (default: 15)
timeout = {}
"#,
        path_to_string(&cache.directory),
        cache.namespace,
        format_size(cache.memory_cost),
        cache.memory_count,
        format_size(cache.disk_size),
        cache.disk_age_days,
        cache.in_memory,
        cache.decompress,
        cache.gc_interval,
        config.download.timeout,
    )
}

/// Display a path, collapsing the home directory to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
