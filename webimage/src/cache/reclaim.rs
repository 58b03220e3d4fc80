//! Age- and size-based reclamation of the primary disk namespace.
//!
//! Reclamation runs in two phases:
//!
//! 1. **Age**: every file whose mtime is older than `max_age` is deleted.
//!    A zero `max_age` skips this phase.
//! 2. **Size**: if the surviving files still total more than `max_size`,
//!    they are deleted oldest-first until the total is at or below half of
//!    the limit. A zero `max_size` skips this phase.
//!
//! The sweep is best-effort. A file that cannot be deleted is logged and
//! skipped; the caller always gets a result.
//!
//! Only regular files directly inside the namespace are considered. Dot-files
//! are in-progress atomic writes and are left alone.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use super::types::{DiskStats, ReclaimResult};

/// Fraction of `max_size` the size phase shrinks the namespace to.
pub const RECLAIM_TARGET_FRACTION: f64 = 0.5;

/// One file in the namespace.
#[derive(Debug, Clone)]
pub(crate) struct CachedFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// List every entry file in `dir`.
///
/// A missing directory is an empty namespace, not an error.
pub(crate) fn scan_entries(dir: &Path) -> Vec<CachedFile> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(dir = %dir.display(), error = %e, "Failed to scan cache directory");
            }
            return Vec::new();
        }
    };

    entries
        .flatten()
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            if !metadata.is_file() {
                return None;
            }
            Some(CachedFile {
                path: entry.path(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size: metadata.len(),
            })
        })
        .collect()
}

/// File count and byte total of `dir`.
pub(crate) fn disk_stats(dir: &Path) -> DiskStats {
    let files = scan_entries(dir);
    DiskStats {
        file_count: files.len(),
        total_bytes: files.iter().map(|f| f.size).sum(),
    }
}

/// Sweep `dir` by age, then by size. Blocks the calling thread.
pub fn reclaim_blocking(dir: &Path, max_age: Duration, max_size: u64) -> ReclaimResult {
    let start = Instant::now();
    let mut result = ReclaimResult::default();
    let mut files = scan_entries(dir);

    if !max_age.is_zero() {
        let now = SystemTime::now();
        files.retain(|file| {
            let age = now.duration_since(file.modified).unwrap_or(Duration::ZERO);
            if age <= max_age {
                return true;
            }
            if remove_entry(&file.path) {
                result.expired += 1;
                result.freed_bytes += file.size;
                false
            } else {
                true
            }
        });
    }

    let mut remaining: u64 = files.iter().map(|f| f.size).sum();
    if max_size > 0 && remaining > max_size {
        let target = (max_size as f64 * RECLAIM_TARGET_FRACTION) as u64;
        files.sort_by_key(|f| f.modified);

        for file in &files {
            if remaining <= target {
                break;
            }
            if remove_entry(&file.path) {
                result.evicted += 1;
                result.freed_bytes += file.size;
                remaining = remaining.saturating_sub(file.size);
            }
        }

        if remaining > target {
            warn!(
                remaining_bytes = remaining,
                target_bytes = target,
                "Reclaim could not reach target size"
            );
        }
    }

    result.duration = start.elapsed();
    if result.removed() > 0 {
        info!(
            dir = %dir.display(),
            expired = result.expired,
            evicted = result.evicted,
            freed_bytes = result.freed_bytes,
            duration_ms = result.duration.as_millis() as u64,
            "Disk cache reclaimed"
        );
    }
    result
}

fn remove_entry(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Failed to delete cache file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Create a test file with specific size and mtime.
    fn create_test_file(path: &Path, size: usize, age_secs: u64) {
        std::fs::write(path, vec![0u8; size]).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        filetime::set_file_mtime(path, filetime::FileTime::from_system_time(mtime)).unwrap();
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scan_entries(&temp_dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_scan_skips_dot_files_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(&root.join("entry"), 10, 0);
        create_test_file(&root.join(".tmpXYZ"), 10, 0);
        std::fs::create_dir(root.join("nested")).unwrap();

        let stats = disk_stats(root);
        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.total_bytes, 10);
    }

    #[test]
    fn test_age_phase_removes_expired_only() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(&root.join("old"), 100, 3600);
        create_test_file(&root.join("fresh"), 100, 10);

        let result = reclaim_blocking(root, Duration::from_secs(600), 0);

        assert_eq!(result.expired, 1);
        assert_eq!(result.evicted, 0);
        assert_eq!(result.freed_bytes, 100);
        assert!(!root.join("old").exists());
        assert!(root.join("fresh").exists());
    }

    #[test]
    fn test_zero_age_disables_age_phase() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(&root.join("ancient"), 100, 10 * 365 * 24 * 3600);

        let result = reclaim_blocking(root, Duration::ZERO, 0);

        assert_eq!(result.removed(), 0);
        assert!(root.join("ancient").exists());
    }

    #[test]
    fn test_size_phase_removes_oldest_until_half_limit() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for i in 0..5u64 {
            create_test_file(&root.join(format!("file{}", i)), 1000, (5 - i) * 60);
        }

        // 5000 bytes over a 4000 byte limit: shrink to 2000.
        let result = reclaim_blocking(root, Duration::ZERO, 4000);

        assert_eq!(result.evicted, 3);
        assert_eq!(result.freed_bytes, 3000);
        assert!(!root.join("file0").exists());
        assert!(!root.join("file1").exists());
        assert!(!root.join("file2").exists());
        assert!(root.join("file3").exists());
        assert!(root.join("file4").exists());
        assert!(disk_stats(root).total_bytes <= 2000);
    }

    #[test]
    fn test_size_phase_noop_under_limit() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for i in 0..3u64 {
            create_test_file(&root.join(format!("file{}", i)), 1000, i * 60);
        }

        let result = reclaim_blocking(root, Duration::ZERO, 3000);

        assert_eq!(result.removed(), 0);
        assert_eq!(disk_stats(root).file_count, 3);
    }

    #[test]
    fn test_both_phases_combine() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(&root.join("expired"), 500, 7200);
        create_test_file(&root.join("older"), 1000, 300);
        create_test_file(&root.join("newer"), 1000, 100);

        // After the age phase 2000 bytes remain, over a 1500 limit: target 750.
        let result = reclaim_blocking(root, Duration::from_secs(3600), 1500);

        assert_eq!(result.expired, 1);
        assert_eq!(result.evicted, 2);
        assert_eq!(result.freed_bytes, 2500);
    }
}
