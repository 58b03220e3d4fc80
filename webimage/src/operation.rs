//! Per-owner operation tracking.
//!
//! Applications attach loads to things they own (a view or a table row) and
//! reuse those owners for new requests. The registry keeps at most one live
//! operation per `(owner, slot)`: registering a new one cancels the previous
//! one first, so a late result from the stale request observes its token
//! cancelled and is never delivered.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Anything that can be cancelled.
///
/// `cancel` runs while the registry holds its slot lock, so it must not call
/// back into the registry.
pub trait Cancellable: Send + Sync {
    fn cancel(&self);
}

impl Cancellable for CancellationToken {
    fn cancel(&self) {
        CancellationToken::cancel(self);
    }
}

/// Opaque owner handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Allocate a process-unique owner id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an id the application already has, such as an object address or
    /// a row index.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Side table of live operations keyed by `(owner, slot)`.
pub struct OperationRegistry<O: Cancellable> {
    slots: DashMap<(OwnerId, String), O>,
}

impl<O: Cancellable> Default for OperationRegistry<O> {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl<O: Cancellable> OperationRegistry<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `operation` for the slot, cancelling whatever was there.
    pub fn set_operation(&self, owner: OwnerId, slot: &str, operation: O) {
        match self.slots.entry((owner, slot.to_string())) {
            Entry::Occupied(mut entry) => {
                entry.get().cancel();
                entry.insert(operation);
                trace!(owner = owner.as_u64(), slot, "Replaced operation");
            }
            Entry::Vacant(entry) => {
                entry.insert(operation);
            }
        }
    }

    /// Cancel and forget the slot's operation. No-op when empty.
    pub fn cancel_operation(&self, owner: OwnerId, slot: &str) {
        if let Some((_, operation)) = self.slots.remove(&(owner, slot.to_string())) {
            operation.cancel();
        }
    }

    /// Forget the slot's operation without cancelling it, typically once it
    /// finished on its own.
    pub fn remove_operation(&self, owner: OwnerId, slot: &str) -> Option<O> {
        self.slots
            .remove(&(owner, slot.to_string()))
            .map(|(_, operation)| operation)
    }

    /// Cancel and forget every slot of `owner`. Returns how many were live.
    pub fn cancel_owner(&self, owner: OwnerId) -> usize {
        let mut cancelled = 0;
        self.slots.retain(|(slot_owner, _), operation| {
            if *slot_owner != owner {
                return true;
            }
            operation.cancel();
            cancelled += 1;
            false
        });
        cancelled
    }

    pub fn has_operation(&self, owner: OwnerId, slot: &str) -> bool {
        self.slots.contains_key(&(owner, slot.to_string()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<O: Cancellable + Clone> OperationRegistry<O> {
    /// The slot's current operation.
    pub fn operation(&self, owner: OwnerId, slot: &str) -> Option<O> {
        self.slots
            .get(&(owner, slot.to_string()))
            .map(|entry| entry.value().clone())
    }
}
