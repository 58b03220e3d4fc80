//! Coalescing table of in-flight fetches.
//!
//! One entry per resolved cache key. The first load to join becomes the
//! leader and drives the fetch; later loads for the same key are appended as
//! waiters and receive the leader's result. Every entry carries a flight id
//! so that a stale leader can never deliver into a newer flight for the same
//! key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::LoadError;
use super::event::{LoadEvent, Sink};
use crate::cache::CacheKey;

struct Waiter<I> {
    id: u64,
    sink: Arc<Sink<I>>,
}

struct Flight<I> {
    id: u64,
    waiters: Vec<Waiter<I>>,
    abort: CancellationToken,
}

/// Role assigned by [`InFlight::join`].
pub(crate) enum Role {
    /// Start the fetch; cancel-on-abandon is wired to `abort`.
    Leader { abort: CancellationToken },
    /// A fetch is already running for this key.
    Follower,
}

/// Registration of one waiter in one flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub flight_id: u64,
    pub waiter_id: u64,
}

pub(crate) struct InFlight<I> {
    flights: Mutex<HashMap<CacheKey, Flight<I>>>,
    next_id: AtomicU64,
}

impl<I> InFlight<I> {
    pub(crate) fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Attach `sink` to the flight for `key`, creating it if needed.
    pub(crate) fn join(&self, key: &CacheKey, sink: Arc<Sink<I>>) -> (Ticket, Role) {
        let waiter_id = self.next_id();
        let mut flights = self.flights.lock();

        if let Some(flight) = flights.get_mut(key) {
            flight.waiters.push(Waiter { id: waiter_id, sink });
            debug!(key = %key, waiters = flight.waiters.len(), "Coalesced onto in-flight fetch");
            let ticket = Ticket {
                flight_id: flight.id,
                waiter_id,
            };
            return (ticket, Role::Follower);
        }

        let flight_id = self.next_id();
        let abort = CancellationToken::new();
        flights.insert(
            key.clone(),
            Flight {
                id: flight_id,
                waiters: vec![Waiter { id: waiter_id, sink }],
                abort: abort.clone(),
            },
        );
        let ticket = Ticket {
            flight_id,
            waiter_id,
        };
        (ticket, Role::Leader { abort })
    }

    /// Current waiters of a flight, for progress fan-out.
    pub(crate) fn waiters(&self, key: &CacheKey, flight_id: u64) -> Vec<Arc<Sink<I>>> {
        let flights = self.flights.lock();
        match flights.get(key) {
            Some(flight) if flight.id == flight_id => {
                flight.waiters.iter().map(|w| Arc::clone(&w.sink)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Remove a finished flight and hand its waiters to the caller.
    ///
    /// Returns `None` if the flight was already cancelled or replaced.
    pub(crate) fn take(&self, key: &CacheKey, flight_id: u64) -> Option<Vec<Arc<Sink<I>>>> {
        let mut flights = self.flights.lock();
        if flights.get(key).map(|f| f.id) != Some(flight_id) {
            return None;
        }
        flights
            .remove(key)
            .map(|flight| flight.waiters.into_iter().map(|w| w.sink).collect())
    }

    /// Drop one waiter. The last waiter to leave aborts the fetch.
    pub(crate) fn leave(&self, key: &CacheKey, ticket: Ticket) {
        let mut flights = self.flights.lock();
        let Some(flight) = flights.get_mut(key) else {
            return;
        };
        if flight.id != ticket.flight_id {
            return;
        }

        flight.waiters.retain(|w| w.id != ticket.waiter_id);
        if flight.waiters.is_empty() {
            flight.abort.cancel();
            flights.remove(key);
            debug!(key = %key, "Last waiter left, fetch aborted");
        }
    }

    /// Abort every flight and fail each waiter with a cancellation.
    ///
    /// Returns the number of flights aborted.
    pub(crate) fn cancel_all(&self) -> usize {
        let drained: Vec<Flight<I>> = {
            let mut flights = self.flights.lock();
            flights.drain().map(|(_, flight)| flight).collect()
        };

        let count = drained.len();
        for flight in drained {
            flight.abort.cancel();
            for waiter in flight.waiters {
                let identifier = waiter.sink.identifier.clone();
                waiter
                    .sink
                    .finish(LoadEvent::failed(LoadError::Cancelled, &identifier));
            }
        }
        count
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.flights.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.flights.lock().is_empty()
    }
}

/// Membership guard: leaves the flight when dropped.
pub(crate) struct Membership<'a, I> {
    in_flight: &'a InFlight<I>,
    key: CacheKey,
    ticket: Ticket,
}

impl<'a, I> Membership<'a, I> {
    pub(crate) fn new(in_flight: &'a InFlight<I>, key: CacheKey, ticket: Ticket) -> Self {
        Self {
            in_flight,
            key,
            ticket,
        }
    }
}

impl<I> Drop for Membership<'_, I> {
    fn drop(&mut self) {
        self.in_flight.leave(&self.key, self.ticket);
    }
}
