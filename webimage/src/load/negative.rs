//! Negative cache of identifiers whose fetch failed.

use dashmap::DashSet;

/// Identifiers that failed permanently during this process.
///
/// Entries live until the process exits, [`FailedIdentifiers::clear`] is
/// called, or a load with `retry_failed` succeeds for the identifier.
#[derive(Debug, Default)]
pub struct FailedIdentifiers {
    set: DashSet<String>,
}

impl FailedIdentifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, identifier: &str) {
        self.set.insert(identifier.to_string());
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.set.contains(identifier)
    }

    pub fn remove(&self, identifier: &str) -> bool {
        self.set.remove(identifier).is_some()
    }

    pub fn clear(&self) {
        self.set.clear();
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_clear() {
        let failed = FailedIdentifiers::new();
        assert!(failed.is_empty());

        failed.record("https://a/x.png");
        failed.record("https://a/x.png");
        failed.record("https://a/y.png");
        assert_eq!(failed.len(), 2);
        assert!(failed.contains("https://a/x.png"));

        assert!(failed.remove("https://a/x.png"));
        assert!(!failed.remove("https://a/x.png"));

        failed.clear();
        assert!(!failed.contains("https://a/y.png"));
    }
}
