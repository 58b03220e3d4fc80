//! Two-tier cache engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        CacheEngine<D>                        │
//! │                                                              │
//! │  query(key) ──► MemoryCache ──hit──► Lookup { Memory }       │
//! │                     │                                        │
//! │                    miss                                      │
//! │                     ▼                                        │
//! │                DiskStore lane: read → decode → decompress    │
//! │                     │            → write back to memory      │
//! │                     ▼                                        │
//! │              Lookup { Disk } / Lookup { None }               │
//! │                                                              │
//! │  store(image, data?, key, to_disk)                           │
//! │      memory now; disk via lane (re-encode if no data)        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The memory tier is consulted synchronously. Everything touching the
//! filesystem goes through the disk lane, so a `store` followed by a `query`
//! for the same key always observes the stored bytes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::disk::{lane_closed, Completion, DiskStore};
use super::error::StorageError;
use super::memory::{MemoryCache, MemoryStats};
use super::path::{namespace_dir, path_in_root};
use super::types::{CacheKey, CacheSource, DiskStats, ReclaimResult};
use crate::decode::ImageDecoder;
use crate::fetch::BoxFuture;

/// Outcome of a cache query.
#[derive(Debug, Clone)]
pub struct Lookup<I> {
    /// The cached image, or `None` on a total miss.
    pub image: Option<I>,
    /// Tier that produced the image. `CacheSource::None` on a miss.
    pub source: CacheSource,
}

impl<I> Lookup<I> {
    pub fn miss() -> Self {
        Self {
            image: None,
            source: CacheSource::None,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.image.is_some()
    }
}

/// Pending cache query.
///
/// Resolves to `Some(lookup)` once the query settles, or to `None` if the
/// handle was cancelled first. A cancelled handle never yields a result, even
/// if the disk read it started completes afterwards.
#[must_use = "queries do nothing unless awaited"]
pub struct QueryHandle<I> {
    cancel: CancellationToken,
    inner: BoxFuture<'static, Option<Lookup<I>>>,
}

impl<I: Send + 'static> QueryHandle<I> {
    fn settled(cancel: CancellationToken, lookup: Lookup<I>) -> Self {
        let token = cancel.clone();
        Self {
            cancel,
            inner: Box::pin(async move { (!token.is_cancelled()).then_some(lookup) }),
        }
    }

    /// Stop the query. Safe to call at any time, including after completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this query when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl<I> Future for QueryHandle<I> {
    type Output = Option<Lookup<I>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().inner.as_mut().poll(cx)
    }
}

/// Memory tier plus disk tier behind one API.
pub struct CacheEngine<D: ImageDecoder> {
    memory: Arc<MemoryCache<D::Image>>,
    disk: DiskStore,
    decoder: Arc<D>,
    config: Arc<CacheConfig>,
}

impl<D: ImageDecoder> CacheEngine<D> {
    /// Compose an engine from an already opened disk store.
    pub fn new(disk: DiskStore, decoder: D, config: Arc<CacheConfig>) -> Self {
        Self {
            memory: Arc::new(MemoryCache::new(Arc::clone(&config))),
            disk,
            decoder: Arc::new(decoder),
            config,
        }
    }

    /// Open an engine whose primary namespace is `<root>/com.webimage.<namespace>`.
    pub fn open(
        root: &Path,
        namespace: &str,
        decoder: D,
        config: Arc<CacheConfig>,
    ) -> Result<Self, StorageError> {
        let disk = DiskStore::new(namespace_dir(root, namespace))?;
        Ok(Self::new(disk, decoder, config))
    }

    pub fn config(&self) -> &Arc<CacheConfig> {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn disk(&self) -> &DiskStore {
        &self.disk
    }

    // =========================================================================
    // Store
    // =========================================================================

    /// Cache `image` under `key`.
    ///
    /// The memory tier is populated immediately (when enabled). With
    /// `to_disk`, `data` is persisted through the lane; when `data` is `None`
    /// the image is re-encoded first. The returned completion settles at the
    /// durability point, or immediately when nothing goes to disk.
    pub fn store(
        &self,
        image: D::Image,
        data: Option<Bytes>,
        key: &CacheKey,
        to_disk: bool,
    ) -> Completion<Result<(), StorageError>> {
        if self.config.cache_images_in_memory() {
            let cost = self.decoder.cost(&image);
            self.memory.set(key.clone(), image.clone(), cost);
        }

        if !to_disk {
            return Completion::ready(Ok(()));
        }

        let decoder = Arc::clone(&self.decoder);
        let key = key.clone();
        self.disk.submit(lane_closed, move |roots| {
            let data = match data {
                Some(data) => data,
                None => decoder
                    .encode(&image)
                    .map_err(|e| StorageError::Encode(e.to_string()))?,
            };
            let result = roots.write(&key, &data);
            if let Err(e) = &result {
                warn!(key = %key, error = %e, "Disk cache write failed");
            }
            result
        })
    }

    /// Persist raw bytes only, on the calling thread. Blocks.
    pub fn store_data_to_disk_sync(&self, data: &[u8], key: &CacheKey) -> Result<(), StorageError> {
        self.disk.write_sync(key, data)
    }

    // =========================================================================
    // Query
    // =========================================================================

    /// Look `key` up in memory, then on disk.
    ///
    /// A memory hit resolves without touching the lane. A disk hit is decoded
    /// (and decompressed if configured) on the lane and written back into the
    /// memory tier before the handle resolves.
    pub fn query(&self, key: &CacheKey) -> QueryHandle<D::Image> {
        let cancel = CancellationToken::new();

        if let Some(image) = self.memory.get(key) {
            return QueryHandle::settled(
                cancel,
                Lookup {
                    image: Some(image),
                    source: CacheSource::Memory,
                },
            );
        }

        let memory = Arc::clone(&self.memory);
        let decoder = Arc::clone(&self.decoder);
        let config = Arc::clone(&self.config);
        let lane_token = cancel.clone();
        let key = key.clone();

        let found = self.disk.submit(
            || None,
            move |roots| {
                if lane_token.is_cancelled() {
                    return None;
                }
                let data = roots.read(&key)?;
                load_into_memory(&memory, &*decoder, &config, key, &data)
            },
        );

        let token = cancel.clone();
        QueryHandle {
            cancel,
            inner: Box::pin(async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    image = found => {
                        if token.is_cancelled() {
                            return None;
                        }
                        Some(match image {
                            Some(image) => Lookup {
                                image: Some(image),
                                source: CacheSource::Disk,
                            },
                            None => Lookup::miss(),
                        })
                    }
                }
            }),
        }
    }

    /// Memory tier only.
    pub fn query_memory_only(&self, key: &CacheKey) -> Option<D::Image> {
        self.memory.get(key)
    }

    /// Disk tier only, on the calling thread. Reads, decodes and writes the
    /// result back into memory. Expensive; blocks.
    pub fn query_disk_only(&self, key: &CacheKey) -> Option<D::Image> {
        let data = self.disk.read_sync(key)?;
        load_into_memory(&self.memory, &*self.decoder, &self.config, key.clone(), &data)
    }

    /// Memory, then disk, on the calling thread.
    pub fn query_any_sync(&self, key: &CacheKey) -> Option<D::Image> {
        self.query_memory_only(key)
            .or_else(|| self.query_disk_only(key))
    }

    pub fn memory_contains(&self, key: &CacheKey) -> bool {
        self.memory.contains(key)
    }

    /// Existence probe across primary and overlay roots, via the lane.
    pub fn disk_image_exists(&self, key: &CacheKey) -> Completion<bool> {
        self.disk.exists(key.clone())
    }

    pub fn disk_image_exists_sync(&self, key: &CacheKey) -> bool {
        self.disk.exists_sync(key)
    }

    // =========================================================================
    // Removal and maintenance
    // =========================================================================

    /// Remove `key` from memory and, optionally, from disk.
    pub fn remove(&self, key: &CacheKey, from_disk: bool) -> Completion<Result<(), StorageError>> {
        self.memory.remove(key);
        if from_disk {
            self.disk.remove(key.clone())
        } else {
            Completion::ready(Ok(()))
        }
    }

    /// Drop every memory entry. This is the hook for low-memory notifiers.
    pub fn clear_memory(&self) {
        debug!("Clearing memory cache");
        self.memory.clear();
    }

    /// Re-apply the current memory limits right away.
    pub fn trim_memory(&self) {
        self.memory.trim();
    }

    /// Delete the primary disk namespace.
    pub fn clear_disk(&self) -> Completion<Result<(), StorageError>> {
        self.disk.clear()
    }

    /// Reclaim the disk namespace using the limits configured right now.
    pub fn reclaim_old(&self) -> Completion<ReclaimResult> {
        self.disk
            .reclaim(self.config.max_disk_age(), self.config.max_disk_size())
    }

    /// Resolves once every disk job queued so far has settled.
    pub fn flush_disk(&self) -> Completion<()> {
        self.disk.flush()
    }

    pub fn add_read_only_root(&self, root: impl Into<PathBuf>) {
        self.disk.add_read_only_root(root);
    }

    // =========================================================================
    // Paths and statistics
    // =========================================================================

    /// Path of `key` in the primary namespace.
    pub fn default_path(&self, key: &CacheKey) -> PathBuf {
        self.disk.default_path(key)
    }

    /// Path of `key` inside an arbitrary root.
    pub fn path_in_root(&self, key: &CacheKey, root: &Path) -> PathBuf {
        path_in_root(key, root)
    }

    /// Namespace directory the engine would use for `namespace` under `root`.
    pub fn disk_cache_path(root: &Path, namespace: &str) -> PathBuf {
        namespace_dir(root, namespace)
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    /// Bytes in the primary namespace. Scans the directory.
    pub fn disk_size(&self) -> u64 {
        self.disk.total_size()
    }

    /// Entries in the primary namespace. Scans the directory.
    pub fn disk_count(&self) -> usize {
        self.disk.entry_count()
    }

    /// Disk statistics computed off the calling context.
    pub fn calculate_size(&self) -> Completion<DiskStats> {
        self.disk.stats()
    }
}

/// Decode `data`, decompress per config, and populate memory.
fn load_into_memory<D: ImageDecoder>(
    memory: &MemoryCache<D::Image>,
    decoder: &D,
    config: &CacheConfig,
    key: CacheKey,
    data: &[u8],
) -> Option<D::Image> {
    let image = match decoder.decode(data) {
        Ok(image) => image,
        Err(e) => {
            debug!(key = %key, error = %e, "Cached bytes failed to decode, treating as miss");
            return None;
        }
    };
    let image = if config.decompress_on_load() {
        decoder.decompress(image)
    } else {
        image
    };

    if config.cache_images_in_memory() {
        memory.set(key, image.clone(), decoder.cost(&image));
    }
    Some(image)
}
