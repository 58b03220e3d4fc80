//! Load events and the caller-side handle that receives them.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::LoadError;
use super::options::LoadOptions;
use super::token::LoadToken;
use crate::cache::CacheSource;
use crate::fetch::ProgressSink;

/// One delivery for a load.
///
/// A load produces, in order: zero or more partial events (`finished ==
/// false`), optionally a cached event when `refresh_cached` is set, and then
/// exactly one final event. Without `refresh_cached` a cache hit is itself
/// the final event.
#[derive(Debug, Clone)]
pub struct LoadEvent<I> {
    pub image: Option<I>,
    /// Raw bytes, present only for freshly fetched results.
    pub data: Option<Bytes>,
    pub error: Option<LoadError>,
    pub source: CacheSource,
    pub finished: bool,
    pub identifier: String,
}

impl<I> LoadEvent<I> {
    pub(crate) fn cached(image: I, source: CacheSource, identifier: &str) -> Self {
        Self {
            image: Some(image),
            data: None,
            error: None,
            source,
            finished: true,
            identifier: identifier.to_string(),
        }
    }

    pub(crate) fn fetched(image: I, data: Bytes, identifier: &str) -> Self {
        Self {
            image: Some(image),
            data: Some(data),
            error: None,
            source: CacheSource::None,
            finished: true,
            identifier: identifier.to_string(),
        }
    }

    pub(crate) fn partial(image: I, identifier: &str) -> Self {
        Self {
            image: Some(image),
            data: None,
            error: None,
            source: CacheSource::None,
            finished: false,
            identifier: identifier.to_string(),
        }
    }

    pub(crate) fn failed(error: LoadError, identifier: &str) -> Self {
        Self {
            image: None,
            data: None,
            error: Some(error),
            source: CacheSource::None,
            finished: true,
            identifier: identifier.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.image.is_some()
    }
}

// =============================================================================
// Sink (coordinator side)
// =============================================================================

/// Delivery endpoint for one caller.
///
/// At most one final event passes through [`Sink::finish`]; later attempts
/// are dropped. Nothing is sent once the caller's token is cancelled.
pub(crate) struct Sink<I> {
    tx: mpsc::UnboundedSender<LoadEvent<I>>,
    token: LoadToken,
    finished: AtomicBool,
    settled: CancellationToken,
    pub(crate) identifier: String,
    pub(crate) options: LoadOptions,
    pub(crate) progress: Option<ProgressSink>,
}

impl<I> Sink<I> {
    pub(crate) fn new(
        identifier: String,
        options: LoadOptions,
        progress: Option<ProgressSink>,
    ) -> (Self, LoadHandle<I>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = LoadToken::new();
        let sink = Self {
            tx,
            token: token.clone(),
            finished: AtomicBool::new(false),
            settled: CancellationToken::new(),
            identifier,
            options,
            progress,
        };
        (sink, LoadHandle { token, events: rx })
    }

    pub(crate) fn token(&self) -> &LoadToken {
        &self.token
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Deliver a non-final event.
    pub(crate) fn send(&self, event: LoadEvent<I>) {
        if !self.token.is_cancelled() && !self.is_finished() {
            let _ = self.tx.send(event);
        }
    }

    /// Deliver the final event. Returns whether this call was the one that
    /// finished the sink.
    pub(crate) fn finish(&self, event: LoadEvent<I>) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        if !self.token.is_cancelled() {
            let _ = self.tx.send(event);
        }
        self.settled.cancel();
        true
    }

    /// Resolves once a final event has been accepted.
    pub(crate) async fn settled(&self) {
        self.settled.cancelled().await
    }
}

// =============================================================================
// LoadHandle (caller side)
// =============================================================================

/// Caller side of a load.
///
/// Events are read on whatever task polls the handle, which makes that task
/// the delivery context. Once the handle's token is cancelled, for example by
/// [`OperationRegistry::set_operation`](crate::operation::OperationRegistry::set_operation)
/// replacing it, the handle yields nothing more, even if a stale event was
/// already queued.
pub struct LoadHandle<I> {
    token: LoadToken,
    events: mpsc::UnboundedReceiver<LoadEvent<I>>,
}

impl<I> LoadHandle<I> {
    pub fn token(&self) -> LoadToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Next event, or `None` once the load is over or cancelled.
    pub async fn recv(&mut self) -> Option<LoadEvent<I>> {
        self.next().await
    }

    /// Drain the load and return its last event.
    pub async fn wait(mut self) -> Option<LoadEvent<I>> {
        let mut last = None;
        while let Some(event) = self.recv().await {
            last = Some(event);
        }
        last
    }

    /// Drain the load and return every event in delivery order.
    pub async fn collect_all(self) -> Vec<LoadEvent<I>> {
        StreamExt::collect(self).await
    }
}

impl<I> Stream for LoadHandle<I> {
    type Item = LoadEvent<I>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.token.is_cancelled() {
            return Poll::Ready(None);
        }
        match this.events.poll_recv(cx) {
            Poll::Ready(Some(_)) if this.token.is_cancelled() => Poll::Ready(None),
            other => other,
        }
    }
}
