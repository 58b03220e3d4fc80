//! Durable disk tier.
//!
//! # Architecture
//!
//! ```text
//!   callers ──write/read/remove/reclaim──► lane queue (mpsc, FIFO)
//!                                             │
//!                                             ▼
//!                                    webimage-disk-lane thread
//!                                    runs one job at a time
//!                                             │
//!                       ┌─────────────────────┼───────────────────────┐
//!                       ▼                     ▼                       ▼
//!              primary namespace      read-only overlay 1 ... overlay N
//!              (read + write)         (read only, registration order)
//! ```
//!
//! Every asynchronous operation is a job on a single ordered lane, so two
//! writes to the same key land in submission order and a read submitted after
//! a write observes it. Each job reports back through a [`Completion`].
//!
//! The `*_sync` variants bypass the lane and run on the calling thread.
//! Writes are always staged in a temp file and renamed into place, so a
//! synchronous reader never observes a partial file even when it races the
//! lane.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::error::StorageError;
use super::path::path_in_root;
use super::reclaim::{disk_stats, reclaim_blocking};
use super::types::{CacheKey, DiskStats, ReclaimResult};

type Job = Box<dyn FnOnce() + Send>;

// =============================================================================
// Completion
// =============================================================================

/// Future resolving when a disk lane job has run.
///
/// If the lane shuts down before the job runs, the completion resolves to the
/// operation's "nothing happened" value (a miss, `false`, an empty result, or
/// [`StorageError::LaneClosed`]) instead of hanging.
#[must_use = "completions do nothing unless awaited"]
pub struct Completion<T> {
    state: CompletionState<T>,
}

enum CompletionState<T> {
    Ready(Option<T>),
    Waiting {
        rx: oneshot::Receiver<T>,
        on_closed: fn() -> T,
    },
}

impl<T> Completion<T> {
    /// A completion that is already settled.
    pub fn ready(value: T) -> Self {
        Self {
            state: CompletionState::Ready(Some(value)),
        }
    }

    fn waiting(rx: oneshot::Receiver<T>, on_closed: fn() -> T) -> Self {
        Self {
            state: CompletionState::Waiting { rx, on_closed },
        }
    }
}

impl<T> Unpin for Completion<T> {}

impl<T> Future for Completion<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        match &mut self.get_mut().state {
            CompletionState::Ready(value) => match value.take() {
                Some(value) => Poll::Ready(value),
                None => Poll::Pending,
            },
            CompletionState::Waiting { rx, on_closed } => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(value)) => Poll::Ready(value),
                Poll::Ready(Err(_)) => Poll::Ready((*on_closed)()),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

pub(crate) fn lane_closed() -> Result<(), StorageError> {
    Err(StorageError::LaneClosed)
}

// =============================================================================
// Roots
// =============================================================================

/// The writable namespace plus the ordered read-only overlays.
pub(crate) struct DiskRoots {
    primary: PathBuf,
    overlays: RwLock<Vec<PathBuf>>,
}

impl DiskRoots {
    pub(crate) fn primary(&self) -> &Path {
        &self.primary
    }

    /// First hit across primary then overlays, in registration order.
    pub(crate) fn read(&self, key: &CacheKey) -> Option<Bytes> {
        let mut candidates = vec![path_in_root(key, &self.primary)];
        candidates.extend(self.overlays.read().iter().map(|root| path_in_root(key, root)));

        for path in candidates {
            match std::fs::read(&path) {
                Ok(data) => return Some(Bytes::from(data)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read cache file");
                }
            }
        }
        None
    }

    pub(crate) fn exists(&self, key: &CacheKey) -> bool {
        if path_in_root(key, &self.primary).is_file() {
            return true;
        }
        self.overlays
            .read()
            .iter()
            .any(|root| path_in_root(key, root).is_file())
    }

    /// Atomically replace the primary entry for `key`.
    pub(crate) fn write(&self, key: &CacheKey, data: &[u8]) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.primary)?;
        let mut staged = tempfile::NamedTempFile::new_in(&self.primary)?;
        staged.write_all(data)?;
        staged
            .persist(path_in_root(key, &self.primary))
            .map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }

    pub(crate) fn remove(&self, key: &CacheKey) -> Result<(), StorageError> {
        match std::fs::remove_file(path_in_root(key, &self.primary)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_dir_all(&self.primary) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        std::fs::create_dir_all(&self.primary)?;
        Ok(())
    }
}

// =============================================================================
// DiskStore
// =============================================================================

/// Key → bytes store rooted at one writable namespace directory.
///
/// Dropping the store closes the lane; queued jobs still run before the lane
/// thread exits.
pub struct DiskStore {
    roots: Arc<DiskRoots>,
    lane: mpsc::UnboundedSender<Job>,
}

impl DiskStore {
    /// Open a store writing to `primary`, creating the directory.
    pub fn new(primary: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::with_read_only_roots(primary, Vec::new())
    }

    /// Open a store with read-only overlay roots searched after `primary`.
    pub fn with_read_only_roots(
        primary: impl Into<PathBuf>,
        overlays: Vec<PathBuf>,
    ) -> Result<Self, StorageError> {
        let roots = Arc::new(DiskRoots {
            primary: primary.into(),
            overlays: RwLock::new(overlays),
        });

        // A missing namespace is recreated on the first write.
        if let Err(e) = std::fs::create_dir_all(roots.primary()) {
            warn!(
                primary = %roots.primary.display(),
                error = %e,
                "Failed to create disk cache directory"
            );
        }

        let (lane, mut jobs) = mpsc::unbounded_channel::<Job>();
        std::thread::Builder::new()
            .name("webimage-disk-lane".to_string())
            .spawn(move || {
                while let Some(job) = jobs.blocking_recv() {
                    job();
                }
                debug!("Disk lane stopped");
            })
            .map_err(|e| StorageError::Spawn(e.to_string()))?;

        debug!(primary = %roots.primary.display(), "Disk store opened");
        Ok(Self { roots, lane })
    }

    /// Queue `job` on the lane.
    pub(crate) fn submit<T, J>(&self, on_closed: fn() -> T, job: J) -> Completion<T>
    where
        T: Send + 'static,
        J: FnOnce(&DiskRoots) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let roots = Arc::clone(&self.roots);
        let job: Job = Box::new(move || {
            let _ = tx.send(job(&roots));
        });

        if self.lane.send(job).is_err() {
            return Completion::ready(on_closed());
        }
        Completion::waiting(rx, on_closed)
    }

    /// Directory every write and reclaim targets.
    pub fn primary_root(&self) -> &Path {
        self.roots.primary()
    }

    /// Overlay roots in search order.
    pub fn read_only_roots(&self) -> Vec<PathBuf> {
        self.roots.overlays.read().clone()
    }

    /// Append a read-only overlay. It is searched after every existing root.
    pub fn add_read_only_root(&self, root: impl Into<PathBuf>) {
        let root = root.into();
        debug!(root = %root.display(), "Registered read-only cache root");
        self.roots.overlays.write().push(root);
    }

    /// Path of `key` in the primary namespace.
    pub fn default_path(&self, key: &CacheKey) -> PathBuf {
        path_in_root(key, self.roots.primary())
    }

    /// Queue a write of `data` under `key`.
    pub fn write(&self, key: CacheKey, data: Bytes) -> Completion<Result<(), StorageError>> {
        self.submit(lane_closed, move |roots| {
            let result = roots.write(&key, &data);
            if let Err(e) = &result {
                warn!(key = %key, error = %e, "Disk cache write failed");
            }
            result
        })
    }

    /// Write on the calling thread. Blocks; do not call from an async task.
    pub fn write_sync(&self, key: &CacheKey, data: &[u8]) -> Result<(), StorageError> {
        self.roots.write(key, data)
    }

    /// Queue a read of `key` across primary and overlays.
    pub fn read(&self, key: CacheKey) -> Completion<Option<Bytes>> {
        self.submit(|| None, move |roots| roots.read(&key))
    }

    /// Read on the calling thread. Blocks.
    pub fn read_sync(&self, key: &CacheKey) -> Option<Bytes> {
        self.roots.read(key)
    }

    /// Queue an existence probe. No content is read.
    pub fn exists(&self, key: CacheKey) -> Completion<bool> {
        self.submit(|| false, move |roots| roots.exists(&key))
    }

    /// Existence probe on the calling thread.
    pub fn exists_sync(&self, key: &CacheKey) -> bool {
        self.roots.exists(key)
    }

    /// Queue removal of `key` from the primary namespace.
    pub fn remove(&self, key: CacheKey) -> Completion<Result<(), StorageError>> {
        self.submit(lane_closed, move |roots| roots.remove(&key))
    }

    /// Queue deletion of the whole primary namespace. Overlays are untouched.
    pub fn clear(&self) -> Completion<Result<(), StorageError>> {
        self.submit(lane_closed, |roots| roots.clear())
    }

    /// Queue an age/size sweep of the primary namespace.
    pub fn reclaim(&self, max_age: Duration, max_size: u64) -> Completion<ReclaimResult> {
        self.submit(ReclaimResult::default, move |roots| {
            reclaim_blocking(roots.primary(), max_age, max_size)
        })
    }

    /// Total bytes in the primary namespace. Scans the directory.
    pub fn total_size(&self) -> u64 {
        disk_stats(self.roots.primary()).total_bytes
    }

    /// Number of entries in the primary namespace. Scans the directory.
    pub fn entry_count(&self) -> usize {
        disk_stats(self.roots.primary()).file_count
    }

    /// Resolves once every job queued before this call has run.
    pub fn flush(&self) -> Completion<()> {
        self.submit(|| (), |_| ())
    }

    /// Count and size computed on the lane rather than the caller.
    pub fn stats(&self) -> Completion<DiskStats> {
        self.submit(DiskStats::default, |roots| disk_stats(roots.primary()))
    }
}
