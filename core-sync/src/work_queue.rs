//! # Work Queue
//!
//! Thread-safe queue of remote-operation requests with a single background
//! worker task.
//!
//! ## Overview
//!
//! Callers enqueue from any task; the worker pulls one request at a time and
//! executes it through the [`RemoteGateway`](crate::gateway::RemoteGateway).
//! Exactly one request runs at a time, which bounds load on the remote
//! service and keeps completion ordering deterministic.
//!
//! Priority is positional: find requests are pushed to the *front* of the
//! deque so the most recently requested view refresh is serviced first,
//! while thumbnail requests join at the *back*: queries always outrank
//! image fetches.
//!
//! Completion and failure events are published on the
//! [`EventBus`](core_runtime::events::EventBus) tagged with the request id.
//! Cancellation is advisory: `clear()` drops queued-but-not-started
//! requests, and events for a stale id are simply ignored by whoever no
//! longer recognizes it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use core_runtime::events::{EventBus, PanelEvent, QueueEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::{Outcome, RemoteGateway};
use crate::request::{FindSpec, Request, RequestId, ThumbnailSpec};

/// Shared queue state between callers and the worker task.
struct QueueInner {
    /// Pending requests: finds at the front, thumbnails at the back
    pending: Mutex<VecDeque<Request>>,
    /// Wakes the worker when a request arrives
    notify: Notify,
    /// Requests executed to completion
    executed: AtomicU64,
    /// Requests that failed during execution
    failed: AtomicU64,
}

/// Queue statistics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    /// Pending find requests
    pub pending_finds: usize,
    /// Pending thumbnail requests
    pub pending_thumbnails: usize,
    /// Requests executed to completion since startup
    pub executed: u64,
    /// Requests that failed during execution since startup
    pub failed: u64,
}

impl QueueStats {
    /// Total pending requests.
    pub fn pending(&self) -> usize {
        self.pending_finds + self.pending_thumbnails
    }
}

/// Work queue with one dedicated background worker.
///
/// A view typically owns one queue; dropping the owning handle after
/// [`shutdown`](Self::shutdown) ends the worker.
pub struct WorkQueue {
    inner: Arc<QueueInner>,
    event_bus: EventBus,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkQueue {
    /// Create an idle queue. Nothing executes until [`start`](Self::start).
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                executed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            event_bus,
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    /// Enqueue a find request at the front of the queue.
    ///
    /// Most-recent-first ordering means a fresh view refresh preempts stale
    /// queued listings.
    pub fn enqueue_find(&self, spec: FindSpec) -> RequestId {
        let request = Request::find(spec);
        let id = request.id;
        {
            let mut pending = self.lock_pending();
            pending.push_front(request);
        }
        debug!(request_id = %id, "Enqueued find request");
        self.inner.notify.notify_one();
        id
    }

    /// Enqueue a thumbnail request at the back of the queue.
    pub fn enqueue_thumbnail(&self, spec: ThumbnailSpec) -> RequestId {
        let request = Request::thumbnail(spec);
        let id = request.id;
        {
            let mut pending = self.lock_pending();
            pending.push_back(request);
        }
        debug!(request_id = %id, "Enqueued thumbnail request");
        self.inner.notify.notify_one();
        id
    }

    /// Atomically discard all not-yet-started requests.
    ///
    /// A request already handed to the worker runs to completion; its
    /// eventual event carries an id nobody recognizes anymore.
    pub fn clear(&self) -> usize {
        let mut pending = self.lock_pending();
        let dropped = pending.len();
        pending.clear();
        if dropped > 0 {
            debug!(dropped = dropped, "Cleared pending requests");
        }
        dropped
    }

    /// Number of requests waiting to be executed.
    pub fn pending_len(&self) -> usize {
        self.lock_pending().len()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> QueueStats {
        let (pending_finds, pending_thumbnails) = {
            let pending = self.lock_pending();
            let finds = pending.iter().filter(|r| r.is_find()).count();
            (finds, pending.len() - finds)
        };
        QueueStats {
            pending_finds,
            pending_thumbnails,
            executed: self.inner.executed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }

    /// Spawn the worker task. Idempotent; a second call is a no-op.
    pub fn start(&self, gateway: Arc<RemoteGateway>) {
        let mut worker = self.worker.lock().expect("worker handle mutex poisoned");
        if worker.is_some() {
            warn!("Worker already started");
            return;
        }
        let inner = Arc::clone(&self.inner);
        let event_bus = self.event_bus.clone();
        let cancel = self.cancel.clone();
        *worker = Some(tokio::spawn(async move {
            worker_loop(inner, gateway, event_bus, cancel).await;
        }));
        info!("Work queue worker started");
    }

    /// Signal the worker to exit after the request it is executing, if any.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.inner.notify.notify_one();
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, VecDeque<Request>> {
        self.inner.pending.lock().expect("work queue mutex poisoned")
    }

    #[cfg(test)]
    fn pending_snapshot(&self) -> Vec<Request> {
        self.lock_pending().iter().cloned().collect()
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The worker loop: pop one request, execute, publish, repeat.
///
/// Every execution is wrapped; one bad request never stops the loop.
async fn worker_loop(
    inner: Arc<QueueInner>,
    gateway: Arc<RemoteGateway>,
    event_bus: EventBus,
    cancel: CancellationToken,
) {
    let mut idle = true;
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let next = {
            let mut pending = inner.pending.lock().expect("work queue mutex poisoned");
            pending.pop_front()
        };

        match next {
            Some(request) => {
                if idle {
                    idle = false;
                    event_bus.emit(PanelEvent::Queue(QueueEvent::Processing)).ok();
                }
                execute_one(&inner, &gateway, &event_bus, request).await;
            }
            None => {
                if !idle {
                    idle = true;
                    event_bus.emit(PanelEvent::Queue(QueueEvent::Drained)).ok();
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = inner.notify.notified() => {}
                }
            }
        }
    }
    debug!("Worker loop exited");
}

async fn execute_one(
    inner: &QueueInner,
    gateway: &RemoteGateway,
    event_bus: &EventBus,
    request: Request,
) {
    let request_id = request.id.as_str();
    debug!(request_id = %request.id, find = request.is_find(), "Executing request");

    match gateway.execute(&request).await {
        Ok(Outcome::Find(records)) => {
            inner.executed.fetch_add(1, Ordering::Relaxed);
            event_bus
                .emit(PanelEvent::Queue(QueueEvent::FindCompleted {
                    request_id,
                    records,
                }))
                .ok();
        }
        Ok(Outcome::Thumbnail(path)) => {
            inner.executed.fetch_add(1, Ordering::Relaxed);
            event_bus
                .emit(PanelEvent::Queue(QueueEvent::ThumbnailReady {
                    request_id,
                    path,
                }))
                .ok();
        }
        Err(e) => {
            inner.failed.fetch_add(1, Ordering::Relaxed);
            warn!(request_id = %request.id, error = %e, "Request execution failed");
            let message = e.to_string();
            let event = if request.is_find() {
                QueueEvent::FindFailed {
                    request_id,
                    message,
                }
            } else {
                QueueEvent::ThumbnailFailed {
                    request_id,
                    message,
                }
            };
            event_bus.emit(PanelEvent::Queue(event)).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thumbnail_cache::ThumbnailCache;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::site::{Filter, FilterOp, Record, SortSpec, TrackingSite};
    use bytes::Bytes;
    use mockall::mock;
    use mockall::Sequence;
    use std::time::Duration;
    use uuid::Uuid;

    mock! {
        pub Site {}

        #[async_trait]
        impl TrackingSite for Site {
            fn host(&self) -> &str;
            #[mockall::concretize]
            async fn find(
                &self,
                entity_type: &str,
                filters: Option<&[Filter]>,
                fields: &[String],
                order: &[SortSpec],
            ) -> BridgeResult<Vec<Record>>;
        }
    }

    mock! {
        pub Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn download(&self, url: &str) -> BridgeResult<Bytes>;
        }
    }

    fn gateway_with(site: MockSite, http: MockHttp) -> Arc<RemoteGateway> {
        let root = std::env::temp_dir().join(format!("queue-test-{}", Uuid::new_v4().simple()));
        Arc::new(RemoteGateway::new(
            Arc::new(site),
            Arc::new(http),
            Arc::new(ThumbnailCache::new(&root, 8)),
        ))
    }

    fn find_spec(entity_type: &str) -> FindSpec {
        FindSpec {
            entity_type: entity_type.to_string(),
            filters: Some(vec![Filter::new("id", FilterOp::Is, serde_json::json!(1))]),
            fields: Vec::new(),
            order: Vec::new(),
        }
    }

    fn thumb_spec(id: i64) -> ThumbnailSpec {
        ThumbnailSpec {
            url: format!("https://cdn.example/{}.jpg", id),
            entity_type: "PublishedFile".to_string(),
            entity_id: id,
        }
    }

    async fn recv_queue_event(
        stream: &mut core_runtime::events::Receiver<PanelEvent>,
    ) -> QueueEvent {
        loop {
            match tokio::time::timeout(Duration::from_secs(5), stream.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event bus closed")
            {
                PanelEvent::Queue(event) => return event,
                PanelEvent::Model(_) => continue,
            }
        }
    }

    #[test]
    fn test_priority_splicing() {
        let queue = WorkQueue::new(EventBus::new(16));

        let thumb = queue.enqueue_thumbnail(thumb_spec(1));
        let find_old = queue.enqueue_find(find_spec("PublishedFile"));
        let find_new = queue.enqueue_find(find_spec("PublishedFile"));

        // Newest find first, then older find, thumbnails last
        let order: Vec<RequestId> = queue
            .pending_snapshot()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(order, vec![find_new, find_old, thumb]);

        let stats = queue.stats();
        assert_eq!(stats.pending_finds, 2);
        assert_eq!(stats.pending_thumbnails, 1);
    }

    #[tokio::test]
    async fn test_clear_before_start_discards_everything() {
        // One find, one thumbnail, then clear() before the worker starts:
        // zero requests reach the gateway.
        let mut site = MockSite::new();
        site.expect_find().never();
        let mut http = MockHttp::new();
        http.expect_download().never();

        let bus = EventBus::new(16);
        let queue = WorkQueue::new(bus.clone());
        queue.enqueue_find(find_spec("PublishedFile"));
        queue.enqueue_thumbnail(thumb_spec(1));

        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.pending_len(), 0);

        queue.start(gateway_with(site, http));
        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.shutdown();

        assert_eq!(queue.stats().executed, 0);
    }

    #[tokio::test]
    async fn test_completion_events_carry_request_id() {
        let mut site = MockSite::new();
        site.expect_find()
            .times(1)
            .returning(|_, _, _, _| Ok(vec![Record::new("PublishedFile", 1)]));

        let bus = EventBus::new(16);
        let mut stream = bus.subscribe();
        let queue = WorkQueue::new(bus.clone());
        queue.start(gateway_with(site, MockHttp::new()));

        let id = queue.enqueue_find(find_spec("PublishedFile"));

        assert_eq!(recv_queue_event(&mut stream).await, QueueEvent::Processing);
        match recv_queue_event(&mut stream).await {
            QueueEvent::FindCompleted {
                request_id,
                records,
            } => {
                assert_eq!(request_id, id.as_str());
                assert_eq!(records.len(), 1);
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(recv_queue_event(&mut stream).await, QueueEvent::Drained);

        queue.shutdown();
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_loop() {
        let mut site = MockSite::new();
        let mut seq = Sequence::new();
        site.expect_find()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| {
                Err(BridgeError::OperationFailed("connection reset".to_string()))
            });
        site.expect_find()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(Vec::new()));

        let bus = EventBus::new(16);
        let mut stream = bus.subscribe();
        let queue = WorkQueue::new(bus.clone());
        queue.start(gateway_with(site, MockHttp::new()));

        let first = queue.enqueue_find(find_spec("PublishedFile"));
        // Wait for the failure before enqueuing the second, so front-insertion
        // cannot reorder them.
        loop {
            if let QueueEvent::FindFailed { request_id, .. } = recv_queue_event(&mut stream).await {
                assert_eq!(request_id, first.as_str());
                break;
            }
        }

        let second = queue.enqueue_find(find_spec("PublishedFile"));
        loop {
            if let QueueEvent::FindCompleted { request_id, .. } =
                recv_queue_event(&mut stream).await
            {
                assert_eq!(request_id, second.as_str());
                break;
            }
        }

        let stats = queue.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.executed, 1);

        queue.shutdown();
    }

    #[tokio::test]
    async fn test_busy_transitions() {
        let mut site = MockSite::new();
        site.expect_find()
            .times(2)
            .returning(|_, _, _, _| Ok(Vec::new()));

        let bus = EventBus::new(16);
        let mut stream = bus.subscribe();
        let queue = WorkQueue::new(bus.clone());
        queue.start(gateway_with(site, MockHttp::new()));

        queue.enqueue_find(find_spec("PublishedFile"));
        let mut events = Vec::new();
        loop {
            let event = recv_queue_event(&mut stream).await;
            let done = event == QueueEvent::Drained;
            events.push(event);
            if done {
                break;
            }
        }
        assert_eq!(events.first(), Some(&QueueEvent::Processing));
        assert_eq!(events.last(), Some(&QueueEvent::Drained));

        // A second burst re-announces processing
        queue.enqueue_find(find_spec("PublishedFile"));
        assert_eq!(recv_queue_event(&mut stream).await, QueueEvent::Processing);

        queue.shutdown();
    }
}
