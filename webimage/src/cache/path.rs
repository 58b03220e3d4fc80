//! On-disk path derivation.
//!
//! Each entry is stored as a single file named by the SHA-256 digest of its
//! cache key, with the identifier's extension appended when one can be
//! derived:
//!
//! ```text
//! <root>/com.webimage.<namespace>/<sha256(key)>[.<ext>]
//! ```
//!
//! These functions are pure so external tools (for example a bundler that
//! pre-seeds a read-only overlay) can compute matching paths offline.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::types::CacheKey;

/// Prefix applied to every namespace directory.
pub const NAMESPACE_PREFIX: &str = "com.webimage.";

/// Longest extension preserved on disk.
const MAX_EXTENSION_LEN: usize = 8;

/// Filename for `key`: lowercase hex digest plus the preserved extension.
///
/// # Example
///
/// ```
/// use webimage::cache::{cache_file_name, CacheKey};
///
/// let name = cache_file_name(&CacheKey::new("https://example.com/logo.png?v=2"));
/// assert!(name.ends_with(".png"));
/// assert_eq!(name.len(), 64 + ".png".len());
/// ```
pub fn cache_file_name(key: &CacheKey) -> String {
    let digest = format!("{:x}", Sha256::digest(key.as_str().as_bytes()));
    match extension_of(key.as_str()) {
        Some(ext) => format!("{}.{}", digest, ext),
        None => digest,
    }
}

/// Path of `key` inside an arbitrary root directory.
pub fn path_in_root(key: &CacheKey, root: &Path) -> PathBuf {
    root.join(cache_file_name(key))
}

/// Directory for `namespace` under `root`.
///
/// # Example
///
/// ```
/// use std::path::{Path, PathBuf};
/// use webimage::cache::namespace_dir;
///
/// assert_eq!(
///     namespace_dir(Path::new("/var/cache"), "avatars"),
///     PathBuf::from("/var/cache/com.webimage.avatars")
/// );
/// ```
pub fn namespace_dir(root: &Path, namespace: &str) -> PathBuf {
    root.join(format!("{}{}", NAMESPACE_PREFIX, namespace))
}

/// Extension of the identifier's last path segment, ignoring query string,
/// fragment and (for URLs) the authority.
fn extension_of(identifier: &str) -> Option<&str> {
    let end = identifier.find(['?', '#']).unwrap_or(identifier.len());
    let mut path = &identifier[..end];

    if let Some(scheme_end) = path.find("://") {
        let rest = &path[scheme_end + 3..];
        path = rest.find('/').map(|i| &rest[i..]).unwrap_or("");
    }

    let segment = path.rsplit('/').next().unwrap_or("");
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext)
}
