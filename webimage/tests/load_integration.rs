//! End-to-end loading through the coordinator with an in-process fetcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use webimage::cache::{CacheConfig, CacheEngine, CacheKey, CacheSource};
use webimage::decode::BytesDecoder;
use webimage::fetch::{BoxFuture, FetchError, FetchRequest, Fetcher, Progress};
use webimage::load::{LoadCoordinator, LoadDelegate, LoadError, LoadOptions, LoadToken};
use webimage::operation::{OperationRegistry, OwnerId};

/// Serves canned responses after a delay, one progress report per chunk.
struct TestFetcher {
    responses: Mutex<HashMap<String, Result<Bytes, FetchError>>>,
    delay: Duration,
    chunks: usize,
    calls: AtomicUsize,
    cancels: Mutex<Vec<CancellationToken>>,
}

impl TestFetcher {
    fn new(delay: Duration) -> Arc<Self> {
        Self::with_chunks(delay, 1)
    }

    fn with_chunks(delay: Duration, chunks: usize) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            delay,
            chunks,
            calls: AtomicUsize::new(0),
            cancels: Mutex::new(Vec::new()),
        })
    }

    fn respond(&self, identifier: &str, response: Result<Bytes, FetchError>) {
        self.responses
            .lock()
            .insert(identifier.to_string(), response);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Cancellation token handed to the n-th fetch.
    fn cancel_token(&self, n: usize) -> CancellationToken {
        self.cancels.lock()[n].clone()
    }
}

impl Fetcher for TestFetcher {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<Bytes, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cancels.lock().push(request.cancel.clone());
        let response = self
            .responses
            .lock()
            .get(&request.identifier)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::Status {
                    status: 404,
                    identifier: request.identifier.clone(),
                })
            });

        Box::pin(async move {
            tokio::select! {
                _ = request.cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }

            if let Ok(data) = &response {
                let step = (data.len() / self.chunks).max(1);
                let mut received = 0;
                while received < data.len() {
                    received = (received + step).min(data.len());
                    request.report(Progress {
                        received: received as u64,
                        expected: Some(data.len() as u64),
                        partial: request.options.progressive.then(|| data.slice(..received)),
                    });
                }
            }
            response
        })
    }
}

type Coordinator = LoadCoordinator<BytesDecoder, Arc<TestFetcher>>;

fn coordinator(dir: &TempDir, fetcher: &Arc<TestFetcher>) -> Coordinator {
    let engine = CacheEngine::open(
        dir.path(),
        "integration",
        BytesDecoder,
        Arc::new(CacheConfig::new()),
    )
    .unwrap();
    LoadCoordinator::new(Arc::new(engine), Arc::clone(fetcher), Handle::current())
}

async fn wait_idle(coordinator: &Coordinator) {
    while coordinator.is_any_running() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn test_concurrent_loads_share_one_fetch() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::from_millis(20));
    fetcher.respond("https://img/a.png", Ok(Bytes::from_static(b"shared body")));
    let coordinator = coordinator(&dir, &fetcher);

    let first = coordinator.load("https://img/a.png", LoadOptions::default(), None);
    let second = coordinator.load("https://img/a.png", LoadOptions::default(), None);

    let (a, b) = tokio::join!(first.wait(), second.wait());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(a.image, b.image);
    assert_eq!(a.data, b.data);
    assert_eq!(a.image, Some(Bytes::from_static(b"shared body")));
    assert!(a.finished && b.finished);
}

#[tokio::test]
async fn test_filtered_key_then_memory_hit() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::from_millis(10));
    fetcher.respond("u1", Ok(Bytes::from_static(b"B")));
    let coordinator = coordinator(&dir, &fetcher);
    coordinator.set_key_filter(Some(Arc::new(|id: &str| {
        (id == "u1").then(|| "k1".to_string())
    })));

    let first = coordinator
        .load("u1", LoadOptions::default(), None)
        .wait()
        .await
        .unwrap();
    assert_eq!(first.image, Some(Bytes::from_static(b"B")));
    assert_eq!(first.data, Some(Bytes::from_static(b"B")));
    assert!(first.error.is_none());
    assert_eq!(first.source, CacheSource::None);
    assert!(first.finished);
    assert_eq!(first.identifier, "u1");
    assert!(coordinator.engine().memory_contains(&CacheKey::new("k1")));

    let second = coordinator
        .load("u1", LoadOptions::default(), None)
        .wait()
        .await
        .unwrap();
    assert_eq!(second.image, Some(Bytes::from_static(b"B")));
    assert!(second.data.is_none());
    assert!(second.error.is_none());
    assert_eq!(second.source, CacheSource::Memory);
    assert!(second.finished);
    assert_eq!(second.identifier, "u1");
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_refresh_cached_delivers_twice() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::from_millis(5));
    fetcher.respond("u", Ok(Bytes::from_static(b"stale")));
    let coordinator = coordinator(&dir, &fetcher);
    coordinator.load("u", LoadOptions::default(), None).wait().await;

    fetcher.respond("u", Ok(Bytes::from_static(b"fresh")));
    let events = coordinator
        .load("u", LoadOptions::new().refresh_cached(), None)
        .collect_all()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].source, CacheSource::Memory);
    assert_eq!(events[0].image, Some(Bytes::from_static(b"stale")));
    assert!(events[0].finished);
    assert_eq!(events[1].source, CacheSource::None);
    assert_eq!(events[1].image, Some(Bytes::from_static(b"fresh")));
    assert!(events[1].finished);
    assert_eq!(fetcher.calls(), 2);

    // The refreshed value replaced the cached one.
    assert_eq!(
        coordinator.engine().query_memory_only(&CacheKey::new("u")),
        Some(Bytes::from_static(b"fresh"))
    );
}

#[tokio::test]
async fn test_disk_round_trip_after_memory_clear() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::ZERO);
    let coordinator = coordinator(&dir, &fetcher);
    let data = Bytes::from_static(b"persisted");

    coordinator
        .engine()
        .store(data.clone(), Some(data.clone()), &CacheKey::new("u"), true)
        .await
        .unwrap();
    coordinator.engine().clear_memory();

    let event = coordinator
        .load("u", LoadOptions::default(), None)
        .wait()
        .await
        .unwrap();
    assert_eq!(event.source, CacheSource::Disk);
    assert_eq!(event.image, Some(data));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_failed_identifier_short_circuits() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::ZERO);
    let coordinator = coordinator(&dir, &fetcher);

    let first = coordinator
        .load("missing", LoadOptions::default(), None)
        .wait()
        .await
        .unwrap();
    assert!(matches!(
        first.error,
        Some(LoadError::Fetch(FetchError::Status { status: 404, .. }))
    ));
    assert!(first.image.is_none());
    assert!(first.finished);

    let second = coordinator
        .load("missing", LoadOptions::default(), None)
        .wait()
        .await
        .unwrap();
    assert_eq!(
        second.error,
        Some(LoadError::PreviouslyFailed("missing".to_string()))
    );
    assert!(second.error.as_ref().is_some_and(LoadError::is_cancellation));
    assert_eq!(fetcher.calls(), 1);

    coordinator
        .load("missing", LoadOptions::new().retry_failed(), None)
        .wait()
        .await;
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_replaced_operation_never_delivers() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::from_millis(30));
    fetcher.respond("old", Ok(Bytes::from_static(b"old image")));
    fetcher.respond("new", Ok(Bytes::from_static(b"new image")));
    let coordinator = coordinator(&dir, &fetcher);
    let registry: OperationRegistry<LoadToken> = OperationRegistry::new();
    let owner = OwnerId::next();

    let mut stale = coordinator.load("old", LoadOptions::default(), None);
    registry.set_operation(owner, "image", stale.token());

    let current = coordinator.load("new", LoadOptions::default(), None);
    registry.set_operation(owner, "image", current.token());

    assert!(stale.token().is_cancelled());
    assert!(stale.recv().await.is_none());

    let event = current.wait().await.unwrap();
    assert_eq!(event.image, Some(Bytes::from_static(b"new image")));
    registry.remove_operation(owner, "image");

    // The stale load never reached its fetch.
    wait_idle(&coordinator).await;
    assert!(!coordinator
        .engine()
        .memory_contains(&CacheKey::new("old")));
}

#[tokio::test]
async fn test_one_waiter_leaving_keeps_fetch_alive() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::from_millis(200));
    fetcher.respond("u", Ok(Bytes::from_static(b"body")));
    let coordinator = coordinator(&dir, &fetcher);

    let leaving = coordinator.load("u", LoadOptions::default(), None);
    while fetcher.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let staying = coordinator.load("u", LoadOptions::default(), None);
    tokio::time::sleep(Duration::from_millis(20)).await;
    leaving.cancel();

    let event = staying.wait().await.unwrap();
    assert!(event.is_success());
    assert!(leaving.wait().await.is_none());
    assert_eq!(fetcher.calls(), 1);
    assert!(!fetcher.cancel_token(0).is_cancelled());
}

#[tokio::test]
async fn test_all_waiters_leaving_aborts_fetch() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::from_secs(10));
    fetcher.respond("u", Ok(Bytes::from_static(b"body")));
    let coordinator = coordinator(&dir, &fetcher);

    let handle = coordinator.load("u", LoadOptions::default(), None);
    while fetcher.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    handle.cancel();

    wait_idle(&coordinator).await;
    assert!(fetcher.cancel_token(0).is_cancelled());
    assert!(!coordinator.engine().memory_contains(&CacheKey::new("u")));
}

#[tokio::test]
async fn test_cancel_all_fails_every_waiter() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::from_secs(10));
    fetcher.respond("a", Ok(Bytes::from_static(b"a")));
    fetcher.respond("b", Ok(Bytes::from_static(b"b")));
    let coordinator = coordinator(&dir, &fetcher);

    let a = coordinator.load("a", LoadOptions::default(), None);
    let b = coordinator.load("b", LoadOptions::default(), None);
    while fetcher.calls() < 2 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(coordinator.is_any_running());

    coordinator.cancel_all();

    for handle in [a, b] {
        let event = handle.wait().await.unwrap();
        assert_eq!(event.error, Some(LoadError::Cancelled));
        assert!(event.finished);
    }
    wait_idle(&coordinator).await;
    assert!(fetcher.cancel_token(0).is_cancelled());
    assert!(fetcher.cancel_token(1).is_cancelled());
    assert!(!coordinator.is_failed("a"));
}

#[tokio::test]
async fn test_cancel_all_before_fetch_starts() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::ZERO);
    fetcher.respond("u", Ok(Bytes::from_static(b"u")));
    let coordinator = coordinator(&dir, &fetcher);

    let handle = coordinator.load("u", LoadOptions::default(), None);
    coordinator.cancel_all();

    let event = handle.wait().await.unwrap();
    assert_eq!(event.error, Some(LoadError::Cancelled));

    let event = coordinator
        .load("u", LoadOptions::default(), None)
        .wait()
        .await
        .unwrap();
    assert!(event.is_success());
}

#[tokio::test]
async fn test_progressive_partials_precede_final() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::with_chunks(Duration::ZERO, 4);
    fetcher.respond("u", Ok(Bytes::from_static(b"abcdefgh")));
    let coordinator = coordinator(&dir, &fetcher);

    let reports = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reports);
    let events = coordinator
        .load(
            "u",
            LoadOptions::new().progressive_download(),
            Some(Arc::new(move |_: Progress| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .collect_all()
        .await;

    let (partials, finals): (Vec<_>, Vec<_>) = events.iter().partition(|e| !e.finished);
    assert_eq!(partials.len(), 4);
    assert_eq!(partials[0].image, Some(Bytes::from_static(b"ab")));
    assert_eq!(finals.len(), 1);
    assert!(events.last().is_some_and(|e| e.finished));
    assert_eq!(reports.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_non_progressive_load_gets_no_partials() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::with_chunks(Duration::ZERO, 4);
    fetcher.respond("u", Ok(Bytes::from_static(b"abcdefgh")));
    let coordinator = coordinator(&dir, &fetcher);

    let events = coordinator
        .load("u", LoadOptions::default(), None)
        .collect_all()
        .await;

    assert_eq!(events.len(), 1);
    assert!(events[0].finished);
}

struct Blocklist;

impl LoadDelegate<Bytes> for Blocklist {
    fn should_fetch(&self, identifier: &str) -> bool {
        !identifier.starts_with("blocked")
    }
}

#[tokio::test]
async fn test_veto_declines_fetch() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::ZERO);
    fetcher.respond("blocked/a", Ok(Bytes::from_static(b"a")));
    let coordinator = coordinator(&dir, &fetcher);
    coordinator.set_delegate(Some(Arc::new(Blocklist)));

    let event = coordinator
        .load("blocked/a", LoadOptions::default(), None)
        .wait()
        .await
        .unwrap();

    assert_eq!(event.error, Some(LoadError::Vetoed("blocked/a".to_string())));
    assert!(event.finished);
    assert_eq!(fetcher.calls(), 0);
    assert!(!coordinator.is_failed("blocked/a"));
}

#[tokio::test]
async fn test_veto_after_cached_refresh_keeps_cached_event() {
    let dir = TempDir::new().unwrap();
    let fetcher = TestFetcher::new(Duration::ZERO);
    let coordinator = coordinator(&dir, &fetcher);
    coordinator
        .save_image_to_cache(Bytes::from_static(b"cached"), "blocked/b")
        .await
        .unwrap();
    coordinator.set_delegate(Some(Arc::new(Blocklist)));

    let events = coordinator
        .load("blocked/b", LoadOptions::new().refresh_cached(), None)
        .collect_all()
        .await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, CacheSource::Memory);
    assert_eq!(fetcher.calls(), 0);
}
