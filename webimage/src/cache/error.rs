//! Storage error type.

use thiserror::Error;

/// Errors raised by the disk tier.
///
/// These never fail a load. The engine logs them and treats the affected
/// entry as absent.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error while reading or writing the namespace.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The disk lane has shut down and can no longer accept work.
    #[error("Disk lane is closed")]
    LaneClosed,

    /// Failed to spawn the disk lane thread.
    #[error("Failed to spawn disk lane: {0}")]
    Spawn(String),

    /// A decoded image could not be re-encoded for persistence.
    #[error("Failed to encode image for disk: {0}")]
    Encode(String),
}

impl StorageError {
    /// Whether this error just means the entry was not there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = StorageError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        assert!(!StorageError::LaneClosed.is_not_found());
    }

    #[test]
    fn test_display() {
        assert_eq!(StorageError::LaneClosed.to_string(), "Disk lane is closed");
        assert!(StorageError::Encode("bad".into()).to_string().contains("bad"));
    }
}
