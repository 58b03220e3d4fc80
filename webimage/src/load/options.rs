//! Per-load options.

use crate::fetch::FetchOptions;

/// Independent switches controlling a single load.
///
/// Every field defaults to `false`. The first group changes coordinator
/// behavior; the second group is forwarded to the fetcher untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Fetch even if the identifier previously failed, and do not record a
    /// new failure.
    pub retry_failed: bool,
    /// Consult and populate only the memory tier.
    pub cache_memory_only: bool,
    /// Deliver a cached hit, then fetch again and deliver the fresh result.
    pub refresh_cached: bool,
    /// Deliver partially decoded images while the fetch is in progress.
    pub progressive_download: bool,
    /// Run the transform hook on animated images too.
    pub transform_animated_image: bool,

    pub low_priority: bool,
    pub high_priority: bool,
    pub continue_in_background: bool,
    pub handle_cookies: bool,
    pub allow_invalid_certificates: bool,
    pub scale_down_large_images: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry_failed(mut self) -> Self {
        self.retry_failed = true;
        self
    }

    pub fn cache_memory_only(mut self) -> Self {
        self.cache_memory_only = true;
        self
    }

    pub fn refresh_cached(mut self) -> Self {
        self.refresh_cached = true;
        self
    }

    pub fn progressive_download(mut self) -> Self {
        self.progressive_download = true;
        self
    }

    pub fn transform_animated_image(mut self) -> Self {
        self.transform_animated_image = true;
        self
    }

    /// Hints handed to the fetcher.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            low_priority: self.low_priority,
            high_priority: self.high_priority,
            progressive: self.progressive_download,
            refresh_cached: self.refresh_cached,
            continue_in_background: self.continue_in_background,
            handle_cookies: self.handle_cookies,
            allow_invalid_certificates: self.allow_invalid_certificates,
            scale_down_large_images: self.scale_down_large_images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_all_off() {
        assert_eq!(LoadOptions::new().fetch_options(), FetchOptions::default());
    }

    #[test]
    fn test_builders_set_single_bits() {
        let options = LoadOptions::new().refresh_cached().progressive_download();

        assert!(options.refresh_cached);
        assert!(options.progressive_download);
        assert!(!options.retry_failed);
        assert!(!options.cache_memory_only);

        let fetch = options.fetch_options();
        assert!(fetch.refresh_cached);
        assert!(fetch.progressive);
        assert!(!fetch.allow_invalid_certificates);
    }

    #[test]
    fn test_transport_hints_forwarded() {
        let options = LoadOptions {
            high_priority: true,
            allow_invalid_certificates: true,
            ..Default::default()
        };
        let fetch = options.fetch_options();
        assert!(fetch.high_priority);
        assert!(fetch.allow_invalid_certificates);
        assert!(!fetch.low_priority);
    }
}
