//! Serialized trigger dispatch
//!
//! All button presses funnel through a FIFO queue drained on a 100 ms tick,
//! with at most one dispatch in flight at a time so the Companion endpoint is
//! never overwhelmed. Successes, failures, and response latency are tracked
//! in `PerformanceState`, the only state shared across tasks.

pub mod fastpath;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::target::ButtonLocation;
pub use fastpath::LocalFastPath;

/// HTTP press timeout; the request is cancelled when it elapses
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval of the queue drain tick
pub const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Weight of the newest sample in the response-time moving average
const RESPONSE_EWMA_WEIGHT: f64 = 0.1;

/// Reasons a single dispatch can fail (non-fatal; the queue keeps draining)
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("status {0}")]
    Status(u16),

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Network(String),
}

/// Dispatch counters and the pending press queue
#[derive(Debug, Default)]
pub struct PerformanceState {
    pub http_errors: u64,
    pub http_successes: u64,
    pub last_http_error: Option<String>,
    /// EWMA of HTTP round-trip time in milliseconds
    pub average_response_time_ms: f64,
    pub pending: VecDeque<ButtonLocation>,
    /// Held while a dequeued press is in flight
    pub is_draining: bool,
}

/// Read-only view of the dispatch counters
#[derive(Debug, Clone, Default)]
pub struct PerformanceSnapshot {
    pub http_errors: u64,
    pub http_successes: u64,
    pub last_http_error: Option<String>,
    pub average_response_time_ms: f64,
    pub queue_len: usize,
}

impl PerformanceSnapshot {
    /// Percentage of successful dispatches, 0 when nothing succeeded yet
    pub fn success_rate_percent(&self) -> u64 {
        let total = self.http_successes + self.http_errors;
        if self.http_successes == 0 || total == 0 {
            0
        } else {
            (self.http_successes * 100 + total / 2) / total
        }
    }
}

struct Inner {
    perf: Mutex<PerformanceState>,
    client: reqwest::Client,
    host: String,
    port: u16,
    queue_enabled: bool,
    timeout: Duration,
    fast_path: Option<Arc<dyn LocalFastPath>>,
}

/// Cloneable handle to the shared dispatch queue
#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<Inner>,
}

impl DispatchQueue {
    pub fn new(
        host: String,
        port: u16,
        queue_enabled: bool,
        fast_path: Option<Arc<dyn LocalFastPath>>,
    ) -> Self {
        Self::with_timeout(host, port, queue_enabled, fast_path, DISPATCH_TIMEOUT)
    }

    /// Like [`DispatchQueue::new`] with an explicit per-press timeout
    pub fn with_timeout(
        host: String,
        port: u16,
        queue_enabled: bool,
        fast_path: Option<Arc<dyn LocalFastPath>>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            inner: Arc::new(Inner {
                perf: Mutex::new(PerformanceState::default()),
                client,
                host,
                port,
                queue_enabled,
                timeout,
                fast_path,
            }),
        }
    }

    /// Request a press: queued by default, immediate when queueing is off
    pub fn press(&self, location: ButtonLocation) {
        if self.inner.queue_enabled {
            self.enqueue(location);
        } else {
            let queue = self.clone();
            tokio::spawn(async move {
                queue.dispatch(location).await;
            });
        }
    }

    /// Append a press to the pending queue (unbounded; the queue length is
    /// the operator's overflow signal)
    pub fn enqueue(&self, location: ButtonLocation) {
        let mut perf = self.inner.perf.lock();
        perf.pending.push_back(location);
        debug!(
            "Queued press {} ({} pending)",
            location,
            perf.pending.len()
        );
    }

    /// Request a press ahead of any backlog (stop-time courtesy return)
    ///
    /// The press still goes out on the drain tick, so the caller is never
    /// blocked on a slow endpoint.
    pub fn press_priority(&self, location: ButtonLocation) {
        if self.inner.queue_enabled {
            let mut perf = self.inner.perf.lock();
            perf.pending.push_front(location);
            debug!(
                "Queued priority press {} ({} pending)",
                location,
                perf.pending.len()
            );
        } else {
            let queue = self.clone();
            tokio::spawn(async move {
                queue.dispatch(location).await;
            });
        }
    }

    /// Drain tick: dispatch the oldest pending press, if any
    ///
    /// No-op while another dispatch is in flight. The draining flag is
    /// released unconditionally, including on dispatch failure or when the
    /// drain future is cancelled mid-flight.
    pub async fn drain_one(&self) {
        let location = {
            let mut perf = self.inner.perf.lock();
            if perf.is_draining {
                return;
            }
            let Some(location) = perf.pending.pop_front() else {
                return;
            };
            perf.is_draining = true;
            location
        };

        let _guard = DrainGuard(&self.inner.perf);
        self.dispatch(location).await;
    }

    /// Press a button immediately, bypassing the queue entirely
    pub async fn dispatch_now(&self, location: ButtonLocation) {
        self.dispatch(location).await;
    }

    /// Execute one press: local fast path first, then the Companion HTTP API
    async fn dispatch(&self, location: ButtonLocation) {
        if let Some(fast_path) = &self.inner.fast_path {
            match fast_path.press(location).await {
                Ok(()) => {
                    self.inner.perf.lock().http_successes += 1;
                    debug!("Pressed {} via local fast path", location);
                    return;
                }
                Err(e) => {
                    debug!("Local fast path failed, falling back to HTTP: {}", e);
                }
            }
        }

        let started = Instant::now();
        let result = self.press_http(location).await;
        let elapsed_ms = started.elapsed().as_millis() as f64;

        let mut perf = self.inner.perf.lock();
        match result {
            Ok(()) => {
                perf.http_successes += 1;
                perf.average_response_time_ms = if perf.average_response_time_ms == 0.0 {
                    elapsed_ms
                } else {
                    perf.average_response_time_ms * (1.0 - RESPONSE_EWMA_WEIGHT)
                        + elapsed_ms * RESPONSE_EWMA_WEIGHT
                };
                debug!("Pressed {} via HTTP ({:.0}ms)", location, elapsed_ms);
            }
            Err(e) => {
                perf.http_errors += 1;
                perf.last_http_error = Some(e.to_string());
                warn!("Press failed for {}: {}", location, e);
            }
        }
    }

    async fn press_http(&self, location: ButtonLocation) -> Result<(), DispatchError> {
        let url = format!(
            "http://{}:{}/api/location/{}/{}/{}/press",
            self.inner.host, self.inner.port, location.page, location.bank, location.button
        );

        let response = self
            .inner
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Timeout(self.inner.timeout)
                } else {
                    DispatchError::Network(e.to_string())
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DispatchError::Status(response.status().as_u16()))
        }
    }

    /// Spawn the 100 ms drain loop
    pub fn spawn_drain_loop(&self) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(DRAIN_INTERVAL);
            loop {
                tick.tick().await;
                queue.drain_one().await;
            }
        })
    }

    pub fn queue_len(&self) -> usize {
        self.inner.perf.lock().pending.len()
    }

    /// Pending presses in dispatch order
    pub fn queued(&self) -> Vec<ButtonLocation> {
        self.inner.perf.lock().pending.iter().copied().collect()
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let perf = self.inner.perf.lock();
        PerformanceSnapshot {
            http_errors: perf.http_errors,
            http_successes: perf.http_successes,
            last_http_error: perf.last_http_error.clone(),
            average_response_time_ms: perf.average_response_time_ms,
            queue_len: perf.pending.len(),
        }
    }

    /// Zero success/error counters and the latency average
    pub fn reset_counters(&self) {
        let mut perf = self.inner.perf.lock();
        perf.http_errors = 0;
        perf.http_successes = 0;
        perf.last_http_error = None;
        perf.average_response_time_ms = 0.0;
    }

    /// Seed counters from a persisted statistics snapshot
    pub fn seed_counters(&self, successes: u64, errors: u64) {
        let mut perf = self.inner.perf.lock();
        perf.http_successes = successes;
        perf.http_errors = errors;
    }
}

/// Clears the draining flag when the drain future completes or is dropped
struct DrainGuard<'a>(&'a Mutex<PerformanceState>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().is_draining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;

    /// Fast path that records presses in arrival order
    struct RecordingFastPath {
        pressed: Mutex<Vec<ButtonLocation>>,
        fail: bool,
    }

    impl RecordingFastPath {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                pressed: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl LocalFastPath for RecordingFastPath {
        async fn press(&self, location: ButtonLocation) -> anyhow::Result<()> {
            if self.fail {
                bail!("host press unavailable");
            }
            self.pressed.lock().push(location);
            Ok(())
        }
    }

    fn loc(button: u32) -> ButtonLocation {
        ButtonLocation::new(1, 1, button)
    }

    #[tokio::test]
    async fn test_drain_is_fifo() {
        let fast_path = RecordingFastPath::new(false);
        let queue = DispatchQueue::new("127.0.0.1".into(), 8000, true, Some(fast_path.clone()));

        queue.enqueue(loc(1));
        queue.enqueue(loc(2));
        queue.enqueue(loc(3));
        assert_eq!(queue.queue_len(), 3);

        queue.drain_one().await;
        queue.drain_one().await;
        queue.drain_one().await;

        assert_eq!(*fast_path.pressed.lock(), vec![loc(1), loc(2), loc(3)]);
        assert_eq!(queue.queue_len(), 0);
        assert_eq!(queue.snapshot().http_successes, 3);
    }

    #[tokio::test]
    async fn test_drain_empty_queue_is_noop() {
        let queue = DispatchQueue::new("127.0.0.1".into(), 8000, true, None);
        queue.drain_one().await;
        let snap = queue.snapshot();
        assert_eq!(snap.http_successes, 0);
        assert_eq!(snap.http_errors, 0);
    }

    #[tokio::test]
    async fn test_drain_skips_while_draining() {
        let queue = DispatchQueue::new("127.0.0.1".into(), 8000, true, None);
        queue.enqueue(loc(1));
        queue.inner.perf.lock().is_draining = true;

        queue.drain_one().await;
        // Entry untouched while another dispatch holds the flag
        assert_eq!(queue.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_fast_path_success_skips_latency_tracking() {
        let fast_path = RecordingFastPath::new(false);
        let queue = DispatchQueue::new("127.0.0.1".into(), 8000, true, Some(fast_path));
        queue.dispatch_now(loc(1)).await;

        let snap = queue.snapshot();
        assert_eq!(snap.http_successes, 1);
        assert_eq!(snap.average_response_time_ms, 0.0);
    }

    #[tokio::test]
    async fn test_http_success_counts_and_tracks_latency() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/location/1/1/1/press")
            .with_status(200)
            .create_async()
            .await;

        let (host, port) = split_host(&server.host_with_port());
        let queue = DispatchQueue::new(host, port, true, None);
        queue.dispatch_now(loc(1)).await;

        mock.assert_async().await;
        let snap = queue.snapshot();
        assert_eq!(snap.http_successes, 1);
        assert_eq!(snap.http_errors, 0);
        assert!(snap.average_response_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_http_error_status_counts_as_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/location/1/1/2/press")
            .with_status(500)
            .create_async()
            .await;

        let (host, port) = split_host(&server.host_with_port());
        let queue = DispatchQueue::new(host, port, true, None);
        queue.dispatch_now(loc(2)).await;

        let snap = queue.snapshot();
        assert_eq!(snap.http_successes, 0);
        assert_eq!(snap.http_errors, 1);
        assert_eq!(snap.last_http_error.as_deref(), Some("status 500"));
    }

    #[tokio::test]
    async fn test_http_timeout_counts_single_error() {
        // Accept connections but never answer, so only the client timeout
        // can end the request
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hold = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                open.push(sock);
            }
        });

        let queue = DispatchQueue::with_timeout(
            "127.0.0.1".into(),
            port,
            true,
            None,
            Duration::from_millis(100),
        );
        queue.dispatch_now(loc(1)).await;

        let snap = queue.snapshot();
        assert_eq!(snap.http_errors, 1);
        assert_eq!(snap.http_successes, 0);
        assert_eq!(snap.last_http_error.as_deref(), Some("timeout after 100ms"));
        hold.abort();
    }

    #[tokio::test]
    async fn test_priority_press_jumps_the_backlog() {
        let fast_path = RecordingFastPath::new(false);
        let queue = DispatchQueue::new("127.0.0.1".into(), 8000, true, Some(fast_path.clone()));
        queue.enqueue(loc(1));
        queue.enqueue(loc(2));
        queue.press_priority(loc(9));

        queue.drain_one().await;
        assert_eq!(*fast_path.pressed.lock(), vec![loc(9)]);
        assert_eq!(queue.queue_len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_drain_releases_flag() {
        // Fast path that never resolves, standing in for a stuck request
        struct StallingFastPath;

        #[async_trait]
        impl LocalFastPath for StallingFastPath {
            async fn press(&self, _location: ButtonLocation) -> anyhow::Result<()> {
                std::future::pending::<()>().await;
                Ok(())
            }
        }

        let queue =
            DispatchQueue::new("127.0.0.1".into(), 8000, true, Some(Arc::new(StallingFastPath)));
        queue.enqueue(loc(1));

        let drained = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.drain_one().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(queue.inner.perf.lock().is_draining);

        drained.abort();
        assert!(drained.await.unwrap_err().is_cancelled());
        assert!(!queue.inner.perf.lock().is_draining);
    }

    #[tokio::test]
    async fn test_network_failure_counts_as_error_and_drain_continues() {
        // Nothing listens on port 1; the connection is refused immediately
        let queue = DispatchQueue::new("127.0.0.1".into(), 1, true, None);
        queue.enqueue(loc(1));
        queue.enqueue(loc(2));

        queue.drain_one().await;
        let snap = queue.snapshot();
        assert_eq!(snap.http_errors, 1);
        assert_eq!(snap.http_successes, 0);
        assert!(!queue.inner.perf.lock().is_draining);

        // The next tick still drains the remaining entry
        queue.drain_one().await;
        assert_eq!(queue.snapshot().http_errors, 2);
        assert_eq!(queue.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_fast_path_failure_falls_back_to_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/location/1/1/3/press")
            .with_status(200)
            .create_async()
            .await;

        let fast_path = RecordingFastPath::new(true);
        let (host, port) = split_host(&server.host_with_port());
        let queue = DispatchQueue::new(host, port, true, Some(fast_path));
        queue.dispatch_now(loc(3)).await;

        mock.assert_async().await;
        assert_eq!(queue.snapshot().http_successes, 1);
    }

    #[test]
    fn test_success_rate() {
        let snap = PerformanceSnapshot {
            http_successes: 3,
            http_errors: 1,
            ..Default::default()
        };
        assert_eq!(snap.success_rate_percent(), 75);

        let snap = PerformanceSnapshot::default();
        assert_eq!(snap.success_rate_percent(), 0);
    }

    fn split_host(host_with_port: &str) -> (String, u16) {
        let (host, port) = host_with_port.rsplit_once(':').unwrap();
        (host.to_string(), port.parse().unwrap())
    }
}
