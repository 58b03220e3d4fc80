//! HTTP fetcher using reqwest.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use tracing::debug;

use super::{BoxFuture, FetchError, FetchRequest, Fetcher, Progress};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// A new partial snapshot is taken once the body has grown by this fraction
/// (1/N) of the last snapshot, so total copying stays linear in body size.
const PARTIAL_GROWTH_DIVISOR: usize = 4;

/// Whether a body of `len` bytes warrants a new partial snapshot after one of
/// `last` bytes.
fn partial_due(last: usize, len: usize) -> bool {
    len > last && len - last >= last / PARTIAL_GROWTH_DIVISOR
}

/// Fetches identifiers as HTTP(S) URLs.
///
/// The body is streamed chunk by chunk so progress can be reported while it
/// downloads. Requests with `allow_invalid_certificates` go through a second
/// client that skips certificate validation. Priority and cookie hints are
/// accepted and ignored.
pub struct HttpFetcher {
    client: reqwest::Client,
    insecure: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let build = |insecure: bool| {
            reqwest::Client::builder()
                .timeout(timeout)
                .danger_accept_invalid_certs(insecure)
                .build()
                .map_err(|e| FetchError::Transport(format!("Failed to create HTTP client: {}", e)))
        };

        Ok(Self {
            client: build(false)?,
            insecure: build(true)?,
        })
    }

    async fn run(&self, request: FetchRequest) -> Result<Bytes, FetchError> {
        let url = reqwest::Url::parse(&request.identifier)
            .map_err(|_| FetchError::InvalidIdentifier(request.identifier.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidIdentifier(request.identifier.clone()));
        }

        let client = if request.options.allow_invalid_certificates {
            &self.insecure
        } else {
            &self.client
        };

        let mut builder = client.get(url);
        if request.options.refresh_cached {
            builder = builder
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }

        let mut response = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => return Err(FetchError::Cancelled),
            response = builder.send() => response.map_err(classify)?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                identifier: request.identifier.clone(),
            });
        }

        let expected = response.content_length();
        let mut body = BytesMut::with_capacity(expected.unwrap_or(0).min(16 * 1024 * 1024) as usize);

        let mut last_partial = 0;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = request.cancel.cancelled() => return Err(FetchError::Cancelled),
                chunk = response.chunk() => chunk.map_err(classify)?,
            };
            let Some(chunk) = chunk else {
                break;
            };

            body.extend_from_slice(&chunk);
            let partial = (request.options.progressive && partial_due(last_partial, body.len()))
                .then(|| {
                    last_partial = body.len();
                    Bytes::copy_from_slice(&body)
                });
            request.report(Progress {
                received: body.len() as u64,
                expected,
                partial,
            });
        }

        debug!(
            identifier = %request.identifier,
            bytes = body.len(),
            status = status.as_u16(),
            "HTTP fetch complete"
        );

        if body.is_empty() {
            return Err(FetchError::EmptyBody(request.identifier));
        }
        Ok(body.freeze())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<Bytes, FetchError>> {
        Box::pin(self.run(request))
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e.to_string())
    } else if e.is_connect() {
        FetchError::Connection(e.to_string())
    } else {
        FetchError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_unparseable_identifier() {
        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher.fetch(FetchRequest::new("not a url")).await;
        assert_eq!(
            result,
            Err(FetchError::InvalidIdentifier("not a url".to_string()))
        );
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher.fetch(FetchRequest::new("file:///etc/hosts")).await;
        assert!(matches!(result, Err(FetchError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_partial_snapshots_grow_geometrically() {
        assert!(partial_due(0, 1));
        assert!(!partial_due(100, 100));
        assert!(!partial_due(100, 124));
        assert!(partial_due(100, 125));

        let mut snapshots = 0;
        let mut last = 0;
        for len in (1..=1_000_000).step_by(1000) {
            if partial_due(last, len) {
                snapshots += 1;
                last = len;
            }
        }
        assert!(snapshots < 40, "took {} snapshots", snapshots);
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(5)).unwrap();
        let request = FetchRequest::new("http://127.0.0.1:9/never");
        request.cancel.cancel();

        let result = fetcher.fetch(request).await;
        assert_eq!(result, Err(FetchError::Cancelled));
    }
}
