//! Load coordinator.
//!
//! Drives each load through cache lookup, fetch coalescing, decoding, store
//! back and delivery:
//!
//! ```text
//! load(id) ──► key = filter(id) ?? id
//!                  │
//!                  ▼
//!            CacheEngine::query ──hit──► cached event ──(refresh_cached?)──┐
//!                  │ miss                                                   │ no: done
//!                  ▼                                                        ▼
//!            delegate.should_fetch ──no──► Vetoed                         (yes)
//!                  │ yes                                                    │
//!                  ▼ ◄──────────────────────────────────────────────────────┘
//!            InFlight::join ──follower──► wait for the leader's result
//!                  │ leader
//!                  ▼
//!            Fetcher::fetch ──► decode ──► transform ──► store ──► fan out
//! ```
//!
//! Every load runs on its own task so `load` never blocks the caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::LoadError;
use super::event::{LoadEvent, LoadHandle, Sink};
use super::in_flight::{InFlight, Membership, Role, Ticket};
use super::negative::FailedIdentifiers;
use super::options::LoadOptions;
use crate::cache::{CacheEngine, CacheKey, CacheSource, Completion, StorageError};
use crate::decode::{DecodeError, ImageDecoder};
use crate::fetch::{FetchRequest, Fetcher, Progress, ProgressSink};

/// Maps an identifier to a cache key. `None` means "use the identifier".
pub type KeyFilter = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Hooks the application can install on a coordinator.
pub trait LoadDelegate<I>: Send + Sync + 'static {
    /// Consulted on every miss, and before a `refresh_cached` re-fetch.
    fn should_fetch(&self, _identifier: &str) -> bool {
        true
    }

    /// Rewrite a freshly decoded image before it is cached and delivered.
    /// Returning `None` keeps the original.
    fn transform(&self, _image: &I, _identifier: &str) -> Option<I> {
        None
    }
}

/// Entry point for loading images by identifier.
///
/// Cheap to clone; clones share the cache, the coalescing table and the
/// negative cache.
pub struct LoadCoordinator<D: ImageDecoder, F: Fetcher> {
    shared: Arc<Shared<D, F>>,
}

impl<D: ImageDecoder, F: Fetcher> Clone for LoadCoordinator<D, F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<D: ImageDecoder, F: Fetcher> {
    engine: Arc<CacheEngine<D>>,
    fetcher: F,
    delegate: RwLock<Option<Arc<dyn LoadDelegate<D::Image>>>>,
    key_filter: RwLock<Option<KeyFilter>>,
    in_flight: InFlight<D::Image>,
    failed: FailedIdentifiers,
    /// Replaced by `cancel_all`; loads started before the swap observe the
    /// old token cancelled.
    generation: Mutex<CancellationToken>,
    running: Arc<AtomicUsize>,
    runtime: Handle,
}

/// Counts a load task as running for as long as it exists.
struct Running(Arc<AtomicUsize>);

impl Running {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<D: ImageDecoder, F: Fetcher> LoadCoordinator<D, F> {
    /// Create a coordinator whose load tasks run on `runtime`.
    pub fn new(engine: Arc<CacheEngine<D>>, fetcher: F, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine,
                fetcher,
                delegate: RwLock::new(None),
                key_filter: RwLock::new(None),
                in_flight: InFlight::new(),
                failed: FailedIdentifiers::new(),
                generation: Mutex::new(CancellationToken::new()),
                running: Arc::new(AtomicUsize::new(0)),
                runtime,
            }),
        }
    }

    pub fn engine(&self) -> &Arc<CacheEngine<D>> {
        &self.shared.engine
    }

    pub fn fetcher(&self) -> &F {
        &self.shared.fetcher
    }

    /// Install or clear the cache key filter.
    pub fn set_key_filter(&self, filter: Option<KeyFilter>) {
        *self.shared.key_filter.write() = filter;
    }

    /// Install or clear the veto and transform hooks.
    pub fn set_delegate(&self, delegate: Option<Arc<dyn LoadDelegate<D::Image>>>) {
        *self.shared.delegate.write() = delegate;
    }

    /// Cache key an identifier resolves to under the current filter.
    pub fn cache_key_for(&self, identifier: &str) -> CacheKey {
        self.shared.cache_key_for(identifier)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Start loading `identifier`.
    ///
    /// Returns immediately. Events arrive on the returned handle; see
    /// [`LoadEvent`] for the delivery order. `progress` receives raw
    /// byte-count reports from the fetcher.
    pub fn load(
        &self,
        identifier: impl Into<String>,
        options: LoadOptions,
        progress: Option<ProgressSink>,
    ) -> LoadHandle<D::Image> {
        let identifier = identifier.into();
        let (sink, handle) = Sink::new(identifier.clone(), options, progress);

        if identifier.is_empty() {
            sink.finish(LoadEvent::failed(LoadError::InvalidIdentifier, &identifier));
            return handle;
        }

        if !options.retry_failed && self.shared.failed.contains(&identifier) {
            debug!(identifier = %identifier, "Identifier previously failed, not fetching");
            sink.finish(LoadEvent::failed(
                LoadError::PreviouslyFailed(identifier.clone()),
                &identifier,
            ));
            return handle;
        }

        let shared = Arc::clone(&self.shared);
        let sink = Arc::new(sink);
        let generation = self.shared.generation.lock().clone();
        let running = Running::enter(&self.shared.running);

        self.shared.runtime.spawn(async move {
            let _running = running;
            let token = sink.token().clone();
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(identifier = %sink.identifier, "Load cancelled by caller");
                }
                _ = generation.cancelled() => {
                    sink.finish(LoadEvent::failed(LoadError::Cancelled, &sink.identifier));
                }
                _ = shared.run(&sink) => {}
            }
        });

        handle
    }

    /// Cancel every outstanding load. Each waiter that has not finished yet
    /// receives a [`LoadError::Cancelled`] event.
    pub fn cancel_all(&self) {
        let previous = std::mem::replace(
            &mut *self.shared.generation.lock(),
            CancellationToken::new(),
        );
        previous.cancel();
        let aborted = self.shared.in_flight.cancel_all();
        info!(aborted, "Cancelled all loads");
    }

    /// Whether any load is still in progress.
    pub fn is_any_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst) > 0 || !self.shared.in_flight.is_empty()
    }

    // =========================================================================
    // Cache access by identifier
    // =========================================================================

    /// Store an image the application produced itself, in memory and on
    /// disk, under the identifier's filtered key.
    pub fn save_image_to_cache(
        &self,
        image: D::Image,
        identifier: &str,
    ) -> Completion<Result<(), StorageError>> {
        let key = self.cache_key_for(identifier);
        self.shared.engine.store(image, None, &key, true)
    }

    /// Whether the identifier is cached in either tier.
    pub async fn cached_image_exists(&self, identifier: &str) -> bool {
        let key = self.cache_key_for(identifier);
        self.shared.engine.memory_contains(&key) || self.shared.engine.disk_image_exists(&key).await
    }

    pub fn disk_image_exists(&self, identifier: &str) -> Completion<bool> {
        let key = self.cache_key_for(identifier);
        self.shared.engine.disk_image_exists(&key)
    }

    // =========================================================================
    // Negative cache
    // =========================================================================

    pub fn is_failed(&self, identifier: &str) -> bool {
        self.shared.failed.contains(identifier)
    }

    /// Forget every recorded failure.
    pub fn reset_failed(&self) {
        self.shared.failed.clear();
    }

    pub fn failed_count(&self) -> usize {
        self.shared.failed.len()
    }
}

impl<D: ImageDecoder, F: Fetcher> Shared<D, F> {
    fn cache_key_for(&self, identifier: &str) -> CacheKey {
        let filtered = self
            .key_filter
            .read()
            .as_ref()
            .and_then(|filter| filter(identifier));
        CacheKey::new(filtered.unwrap_or_else(|| identifier.to_string()))
    }

    fn delegate(&self) -> Option<Arc<dyn LoadDelegate<D::Image>>> {
        self.delegate.read().clone()
    }

    /// Lookup, veto and join phases of one load.
    async fn run(self: &Arc<Self>, sink: &Arc<Sink<D::Image>>) {
        let identifier = sink.identifier.clone();
        let options = sink.options;
        let key = self.cache_key_for(&identifier);

        let cached = if options.cache_memory_only {
            self.engine
                .query_memory_only(&key)
                .map(|image| (image, CacheSource::Memory))
        } else {
            self.engine.query(&key).await.and_then(|lookup| {
                let source = lookup.source;
                lookup.image.map(|image| (image, source))
            })
        };

        let delivered_cached = match cached {
            Some((image, source)) => {
                debug!(identifier = %identifier, key = %key, source = %source, "Cache hit");
                let event = LoadEvent::cached(image, source, &identifier);
                if !options.refresh_cached {
                    sink.finish(event);
                    return;
                }
                sink.send(event);
                true
            }
            None => false,
        };

        let allowed = self
            .delegate()
            .map_or(true, |delegate| delegate.should_fetch(&identifier));
        if !allowed {
            debug!(identifier = %identifier, "Fetch declined by delegate");
            if !delivered_cached {
                sink.finish(LoadEvent::failed(
                    LoadError::Vetoed(identifier.clone()),
                    &identifier,
                ));
            }
            return;
        }

        let (ticket, role) = self.in_flight.join(&key, Arc::clone(sink));
        let _membership = Membership::new(&self.in_flight, key.clone(), ticket);

        if let Role::Leader { abort } = role {
            let shared = Arc::clone(self);
            self.runtime.spawn(shared.drive_fetch(
                key,
                ticket,
                abort,
                identifier,
                options,
            ));
        }

        sink.settled().await;
    }

    /// Fetch phase, run once per flight by its leader.
    #[instrument(skip(self, key, ticket, abort, options), fields(key = %key))]
    async fn drive_fetch(
        self: Arc<Self>,
        key: CacheKey,
        ticket: Ticket,
        abort: CancellationToken,
        identifier: String,
        options: LoadOptions,
    ) {
        let progress: ProgressSink = {
            let shared = Arc::clone(&self);
            let key = key.clone();
            Arc::new(move |report: Progress| shared.forward_progress(&key, ticket, report))
        };
        let request = FetchRequest::new(identifier.clone())
            .with_options(options.fetch_options())
            .with_progress(progress)
            .with_cancel(abort.clone());

        let fetched = tokio::select! {
            biased;
            _ = abort.cancelled() => {
                debug!("Fetch abandoned");
                return;
            }
            result = self.fetcher.fetch(request) => result,
        };

        match fetched {
            Ok(data) => self.complete_success(key, ticket, &abort, &identifier, options, data).await,
            Err(e) => self.complete_failure(&key, ticket, LoadError::Fetch(e)),
        }
    }

    async fn complete_success(
        &self,
        key: CacheKey,
        ticket: Ticket,
        abort: &CancellationToken,
        identifier: &str,
        options: LoadOptions,
        data: Bytes,
    ) {
        let engine = Arc::clone(&self.engine);
        let bytes = data.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            let image = engine.decoder().decode(&bytes)?;
            Ok::<_, DecodeError>(if engine.config().decompress_on_load() {
                engine.decoder().decompress(image)
            } else {
                image
            })
        })
        .await;

        let image = match decoded {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => {
                return self.complete_failure(
                    &key,
                    ticket,
                    LoadError::Decode {
                        identifier: identifier.to_string(),
                        reason: e.to_string(),
                    },
                );
            }
            Err(e) => {
                return self.complete_failure(
                    &key,
                    ticket,
                    LoadError::Decode {
                        identifier: identifier.to_string(),
                        reason: e.to_string(),
                    },
                );
            }
        };

        if abort.is_cancelled() {
            return;
        }

        let animated = self.engine.decoder().is_animated(&image);
        let transformed = self
            .delegate()
            .filter(|_| !animated || options.transform_animated_image)
            .and_then(|delegate| delegate.transform(&image, identifier));
        let (image, disk_data) = match transformed {
            Some(image) => (image, None),
            None => (image, Some(data.clone())),
        };

        let stored = self
            .engine
            .store(image.clone(), disk_data, &key, !options.cache_memory_only);

        let Some(waiters) = self.in_flight.take(&key, ticket.flight_id) else {
            return;
        };
        debug!(waiters = waiters.len(), bytes = data.len(), "Fetch succeeded");
        for sink in waiters {
            if sink.options.retry_failed {
                self.failed.remove(&sink.identifier);
            }
            sink.finish(LoadEvent::fetched(image.clone(), data.clone(), &sink.identifier));
        }

        if let Err(e) = stored.await {
            debug!(error = %e, "Store after fetch failed, result still delivered");
        }
    }

    fn complete_failure(&self, key: &CacheKey, ticket: Ticket, error: LoadError) {
        let Some(waiters) = self.in_flight.take(key, ticket.flight_id) else {
            return;
        };
        let permanent = match &error {
            LoadError::Fetch(e) => !e.is_transient(),
            LoadError::Decode { .. } => true,
            _ => false,
        };
        warn!(error = %error, waiters = waiters.len(), permanent, "Fetch failed");

        for sink in waiters {
            if permanent && !sink.options.retry_failed {
                self.failed.record(&sink.identifier);
            }
            sink.finish(LoadEvent::failed(error.clone(), &sink.identifier));
        }
    }

    /// Relay a fetcher progress report to every waiter of the flight.
    ///
    /// Progressive waiters additionally receive a partially decoded image;
    /// the partial payload is decoded at most once per report.
    fn forward_progress(&self, key: &CacheKey, ticket: Ticket, report: Progress) {
        let waiters = self.in_flight.waiters(key, ticket.flight_id);
        let mut partial: Option<Option<D::Image>> = None;

        for sink in &waiters {
            if let Some(progress) = &sink.progress {
                progress(report.clone());
            }
            if !sink.options.progressive_download {
                continue;
            }
            let Some(bytes) = &report.partial else {
                continue;
            };
            let image = partial.get_or_insert_with(|| self.engine.decoder().decode_partial(bytes));
            if let Some(image) = image {
                sink.send(LoadEvent::partial(image.clone(), &sink.identifier));
            }
        }
    }
}
