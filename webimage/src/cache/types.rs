//! Core cache types shared by both tiers.

use std::fmt;
use std::time::Duration;

/// Identifies one cached resource.
///
/// Keys are derived from a resource identifier (usually a URL), optionally
/// rewritten by the coordinator's key filter. The same identifier run through
/// the same filter always yields the same key. Disk filenames are a digest of
/// the key, see [`crate::cache::path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a cache key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which tier satisfied a lookup.
///
/// `None` is the normal miss signal (and the source reported for freshly
/// fetched content); it is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheSource {
    #[default]
    None,
    Disk,
    Memory,
}

impl fmt::Display for CacheSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheSource::None => "none",
            CacheSource::Disk => "disk",
            CacheSource::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Result of a disk reclamation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimResult {
    /// Entries deleted because they exceeded the maximum age.
    pub expired: usize,
    /// Entries deleted to bring the namespace under its size limit.
    pub evicted: usize,
    /// Total bytes freed across both phases.
    pub freed_bytes: u64,
    /// Wall time spent sweeping.
    pub duration: Duration,
}

impl ReclaimResult {
    /// Total number of entries removed.
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

impl fmt::Display for ReclaimResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reclaim: removed {} entries ({} expired, {} evicted), freed {} bytes in {}ms",
            self.removed(),
            self.expired,
            self.evicted,
            self.freed_bytes,
            self.duration.as_millis()
        )
    }
}

/// Snapshot of the primary disk namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub file_count: usize,
    pub total_bytes: u64,
}
