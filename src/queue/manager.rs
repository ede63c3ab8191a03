//! Queue Manager (spec §4.4): background drain of the persistent queue,
//! retry policy, and completion notification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use crate::core::queued_request::{QueuedRequest, RequestStatus};
use crate::core::request::Request;
use crate::core::result::{Error, Result};
use crate::network::NetworkEstimator;
use crate::queue::store::QueueStore;
use crate::sms::escalation::EscalationTimers;
use crate::transport::http::{HttpTransport, HttpTransportRequest};

/// Drain cadence (spec §4.4: "invoked every 30s").
pub const DRAIN_INTERVAL: Duration = Duration::from_secs(30);
/// Default per-item HTTP attempt timeout during a drain (spec §4.4).
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(30);
/// Entries fetched per drain pass (spec §4.4).
const DRAIN_BATCH_SIZE: usize = 10;

/// Notification sink for completion/failure of queued requests (spec §4.4
/// `on_completed`/`on_failed`, modeled per spec §9 as an injected trait
/// rather than closures on a singleton — the same shape as the teacher's
/// `ActivityLogger`).
#[async_trait]
pub trait QueueEventSink: Send + Sync + 'static {
    async fn on_completed(&self, id: &str, status_code: u16, body: &str);
    async fn on_failed(&self, id: &str, error: &str);
}

/// Sink that only emits `tracing` events — the default, analogous to the
/// teacher's `TracingActivityLogger`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl QueueEventSink for TracingEventSink {
    async fn on_completed(&self, id: &str, status_code: u16, body: &str) {
        tracing::info!(id, status_code, body_len = body.len(), "queued request completed");
    }
    async fn on_failed(&self, id: &str, error: &str) {
        tracing::warn!(id, error, "queued request failed");
    }
}

/// Background drain loop and retry policy over a [`QueueStore`].
pub struct QueueManager {
    store: Arc<dyn QueueStore>,
    http: Arc<dyn HttpTransport>,
    sink: Arc<dyn QueueEventSink>,
    max_queue_size: std::sync::atomic::AtomicUsize,
    retry_timeout: Duration,
    drain_lock: Mutex<()>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    network_loop_handle: Mutex<Option<JoinHandle<()>>>,
    /// Escalation timers to cancel when a drain pass resolves an item to a
    /// terminal state (spec §4.7: "A completed queue drain of that item also
    /// cancels its timer"). Optional because a `QueueManager` can be used
    /// standalone (e.g. in tests) without the SMS escalation machinery.
    escalation: parking_lot::RwLock<Option<Arc<EscalationTimers>>>,
    /// Network estimator whose stability transitions additionally trigger a
    /// drain (spec §4.4: "invoked every 30s, and additionally whenever the
    /// Network Estimator reports is_stable && score > 0.5"). Optional for the
    /// same reason `escalation` is.
    estimator: parking_lot::RwLock<Option<Arc<dyn NetworkEstimator>>>,
}

impl QueueManager {
    pub fn new(
        store: Arc<dyn QueueStore>,
        http: Arc<dyn HttpTransport>,
        sink: Arc<dyn QueueEventSink>,
        max_queue_size: usize,
    ) -> Self {
        Self {
            store,
            http,
            sink,
            max_queue_size: std::sync::atomic::AtomicUsize::new(max_queue_size),
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
            drain_lock: Mutex::new(()),
            loop_handle: Mutex::new(None),
            network_loop_handle: Mutex::new(None),
            escalation: parking_lot::RwLock::new(None),
            estimator: parking_lot::RwLock::new(None),
        }
    }

    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = timeout;
        self
    }

    /// Wire up the escalation timer table so a drain pass that resolves an
    /// item to a terminal state can cancel its still-armed timer, if any.
    pub fn set_escalation_timers(&self, escalation: Arc<EscalationTimers>) {
        *self.escalation.write() = Some(escalation);
    }

    fn cancel_escalation(&self, id: &str) {
        if let Some(escalation) = self.escalation.read().as_ref() {
            escalation.cancel(id);
        }
    }

    /// Wire up the network estimator whose stability transitions should
    /// additionally trigger a drain pass (spec §4.4).
    pub fn set_network_estimator(&self, estimator: Arc<dyn NetworkEstimator>) {
        *self.estimator.write() = Some(estimator);
    }

    /// Update the `QUEUE_FULL` ceiling at runtime (spec §6 `configure()`).
    pub fn set_max_queue_size(&self, max_queue_size: usize) {
        self.max_queue_size.store(max_queue_size, std::sync::atomic::Ordering::SeqCst);
    }

    /// Enqueue `request`, computing its id and `max_retries` per spec §4.4.
    /// Rejects with [`Error::QueueFull`] once `count_pending >= max_queue_size`.
    pub async fn enqueue(&self, request: Request, expires_at: Option<chrono::DateTime<Utc>>) -> Result<QueuedRequest> {
        let max_queue_size = self.max_queue_size.load(std::sync::atomic::Ordering::SeqCst);
        if self.store.count_pending().await? >= max_queue_size {
            return Err(Error::QueueFull { max_queue_size });
        }
        let item = QueuedRequest::new(request, Utc::now(), expires_at);
        self.store.insert(item.clone()).await?;
        Ok(item)
    }

    pub async fn count_pending(&self) -> Result<usize> {
        self.store.count_pending().await
    }

    pub async fn list_pending(&self, limit: usize) -> Result<Vec<QueuedRequest>> {
        self.store.list_pending(limit).await
    }

    pub async fn clear(&self) -> Result<usize> {
        self.store.clear_all().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<QueuedRequest>> {
        self.store.get_by_id(id).await
    }

    /// Access to the underlying store, for collaborators (e.g. the Router's
    /// immediate-SMS path) that need to delete a single row outside a drain.
    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    /// Start the periodic background drain loop (spec §4.4). Idempotent:
    /// calling twice while already running is a no-op.
    pub fn start_background_loop(self: &Arc<Self>) {
        let mut guard = match self.loop_handle.try_lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if guard.is_some() {
            return;
        }
        let this = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DRAIN_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = this.drain_once().await {
                    tracing::error!(error = %err, "drain pass failed");
                }
            }
        }));
    }

    /// Start a second background task that drains immediately on every
    /// network-stability transition, on top of the 30s periodic loop (spec
    /// §4.4). A no-op if no estimator has been wired via
    /// [`Self::set_network_estimator`], or if already running.
    pub fn start_network_triggered_drain(self: &Arc<Self>) {
        let Some(estimator) = self.estimator.read().clone() else { return };
        let mut guard = match self.network_loop_handle.try_lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if guard.is_some() {
            return;
        }
        let this = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let mut stream = estimator.subscribe();
            while let Some(status) = stream.next().await {
                if status.is_stable() && status.quality_score > 0.5 {
                    if let Err(err) = this.drain_once().await {
                        tracing::error!(error = %err, "network-triggered drain pass failed");
                    }
                }
            }
        }));
    }

    /// Stop both background drain tasks (part of `dispose()`, spec §5).
    pub async fn stop_background_loop(&self) {
        if let Some(handle) = self.loop_handle.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.network_loop_handle.lock().await.take() {
            handle.abort();
        }
    }

    /// Run exactly one drain pass now (spec §4.4 steps 1-4). Passes never
    /// overlap (spec §5): a second concurrent call waits for the first to
    /// finish rather than racing it.
    pub async fn drain_once(&self) -> Result<()> {
        let _guard = self.drain_lock.lock().await;
        let now = Utc::now();

        // Record the EXPIRED transition (spec §3) before the rows are
        // destroyed (spec §3: "destroyed on COMPLETED or EXPIRED").
        for item in self.store.list_pending(usize::MAX).await? {
            if item.is_expired(now) {
                self.store.update_status(&item.id, RequestStatus::Expired).await?;
            }
        }
        let expired = self.store.delete_expired(now).await?;
        for id in expired {
            self.cancel_escalation(&id);
            self.sink.on_failed(&id, "Request expired").await;
        }

        let batch = self.store.list_pending(DRAIN_BATCH_SIZE).await?;
        for item in batch {
            self.process_one(item, now).await?;
        }
        Ok(())
    }

    async fn process_one(&self, item: QueuedRequest, now: chrono::DateTime<Utc>) -> Result<()> {
        self.store.update_status(&item.id, RequestStatus::Processing).await?;

        if item.is_expired(now) {
            self.store.update_status(&item.id, RequestStatus::Expired).await?;
            self.store.delete(&item.id).await?;
            self.cancel_escalation(&item.id);
            self.sink.on_failed(&item.id, "Request expired").await;
            return Ok(());
        }

        if item.retry_budget_exhausted() {
            self.store.update_status(&item.id, RequestStatus::Failed).await?;
            self.cancel_escalation(&item.id);
            self.sink.on_failed(&item.id, "Max retries exceeded").await;
            return Ok(());
        }

        let transport_request = HttpTransportRequest::from_request(&item.request);
        match self.http.send(transport_request, self.retry_timeout).await {
            Ok(response) if (200..300).contains(&response.status_code) => {
                self.store.delete(&item.id).await?;
                self.cancel_escalation(&item.id);
                self.sink.on_completed(&item.id, response.status_code, &response.body).await;
            }
            Ok(response) => {
                self.store.increment_retry(&item.id).await?;
                self.store.update_status(&item.id, RequestStatus::Pending).await?;
                self.sink
                    .on_failed(&item.id, &format!("non-2xx response: {}", response.status_code))
                    .await;
            }
            Err(err) => {
                self.store.increment_retry(&item.id).await?;
                self.store.update_status(&item.id, RequestStatus::Pending).await?;
                self.sink.on_failed(&item.id, &err.to_string()).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::request::{Method, Priority};
    use crate::queue::memory_store::InMemoryQueueStore;
    use crate::transport::http::HttpTransportResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct ScriptedHttp {
        responses: StdMutex<Vec<Result<HttpTransportResponse>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for ScriptedHttp {
        async fn send(&self, _req: HttpTransportRequest, _timeout: Duration) -> Result<HttpTransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap().pop().unwrap_or(Err(Error::TransportError("exhausted".into())))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        completed: StdMutex<Vec<String>>,
        failed: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl QueueEventSink for RecordingSink {
        async fn on_completed(&self, id: &str, _status_code: u16, _body: &str) {
            self.completed.lock().unwrap().push(id.to_string());
        }
        async fn on_failed(&self, id: &str, _error: &str) {
            self.failed.lock().unwrap().push(id.to_string());
        }
    }

    fn ok_response() -> HttpTransportResponse {
        HttpTransportResponse { status_code: 200, body: "ok".to_string(), headers: Default::default() }
    }

    #[tokio::test]
    async fn enqueue_rejects_when_full() {
        let store = Arc::new(InMemoryQueueStore::new());
        let http = Arc::new(ScriptedHttp { responses: StdMutex::new(vec![]), calls: AtomicUsize::new(0) });
        let sink = Arc::new(RecordingSink::default());
        let manager = QueueManager::new(store, http, sink, 1);

        manager.enqueue(Request::new(Method::Post, "https://example.com"), None).await.unwrap();
        let err = manager.enqueue(Request::new(Method::Post, "https://example.com/2"), None).await.unwrap_err();
        assert!(matches!(err, Error::QueueFull { .. }));
    }

    #[tokio::test]
    async fn drain_completes_successful_item_and_fires_callback_once() {
        let store = Arc::new(InMemoryQueueStore::new());
        let http = Arc::new(ScriptedHttp {
            responses: StdMutex::new(vec![Ok(ok_response())]),
            calls: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let manager = QueueManager::new(store, http, sink.clone(), 10);

        let item = manager.enqueue(Request::new(Method::Post, "https://example.com"), None).await.unwrap();
        manager.drain_once().await.unwrap();

        assert_eq!(sink.completed.lock().unwrap().as_slice(), &[item.id.clone()]);
        assert_eq!(manager.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_attempt_increments_retry_and_stays_pending() {
        let store = Arc::new(InMemoryQueueStore::new());
        let http = Arc::new(ScriptedHttp {
            responses: StdMutex::new(vec![Err(Error::TransportError("refused".into()))]),
            calls: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let manager = QueueManager::new(store, http, sink.clone(), 10);

        let item = manager.enqueue(Request::new(Method::Post, "https://example.com"), None).await.unwrap();
        manager.drain_once().await.unwrap();

        let fetched = manager.get(&item.id).await.unwrap().expect("still present");
        assert_eq!(fetched.retry_count, 1);
        assert_eq!(fetched.status, RequestStatus::Pending);
        assert_eq!(sink.failed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn item_past_max_retries_transitions_to_failed() {
        let store = Arc::new(InMemoryQueueStore::new());
        let http = Arc::new(ScriptedHttp { responses: StdMutex::new(vec![]), calls: AtomicUsize::new(0) });
        let sink = Arc::new(RecordingSink::default());
        let manager = QueueManager::new(Arc::clone(&store), http, sink.clone(), 10);

        let mut item = manager
            .enqueue(Request::new(Method::Post, "https://example.com").with_priority(Priority::Normal), None)
            .await
            .unwrap();
        item.retry_count = item.max_retries;
        store.insert(item.clone()).await.unwrap();

        manager.drain_once().await.unwrap();

        let fetched = manager.get(&item.id).await.unwrap().expect("still present (FAILED, not deleted)");
        assert_eq!(fetched.status, RequestStatus::Failed);
        assert_eq!(sink.failed.lock().unwrap().len(), 1);
    }

    /// Wraps [`InMemoryQueueStore`] to record every `update_status` call, so
    /// the test below can see the EXPIRED transition that `delete_expired`
    /// itself destroys before a caller could otherwise observe it.
    struct RecordingStore {
        inner: InMemoryQueueStore,
        statuses: StdMutex<Vec<(String, RequestStatus)>>,
    }

    #[async_trait]
    impl QueueStore for RecordingStore {
        async fn insert(&self, item: QueuedRequest) -> Result<()> {
            self.inner.insert(item).await
        }
        async fn get_by_id(&self, id: &str) -> Result<Option<QueuedRequest>> {
            self.inner.get_by_id(id).await
        }
        async fn update_status(&self, id: &str, status: RequestStatus) -> Result<()> {
            self.statuses.lock().unwrap().push((id.to_string(), status));
            self.inner.update_status(id, status).await
        }
        async fn increment_retry(&self, id: &str) -> Result<()> {
            self.inner.increment_retry(id).await
        }
        async fn delete(&self, id: &str) -> Result<()> {
            self.inner.delete(id).await
        }
        async fn delete_expired(&self, now: chrono::DateTime<Utc>) -> Result<Vec<String>> {
            self.inner.delete_expired(now).await
        }
        async fn list_pending(&self, limit: usize) -> Result<Vec<QueuedRequest>> {
            self.inner.list_pending(limit).await
        }
        async fn count_pending(&self) -> Result<usize> {
            self.inner.count_pending().await
        }
        async fn clear_all(&self) -> Result<usize> {
            self.inner.clear_all().await
        }
    }

    #[tokio::test]
    async fn expired_sweep_records_expired_status_before_deleting() {
        let store = Arc::new(RecordingStore { inner: InMemoryQueueStore::new(), statuses: StdMutex::new(vec![]) });
        let http = Arc::new(ScriptedHttp { responses: StdMutex::new(vec![]), calls: AtomicUsize::new(0) });
        let sink = Arc::new(RecordingSink::default());
        let manager = QueueManager::new(Arc::clone(&store) as Arc<dyn QueueStore>, http, sink.clone(), 10);

        let past = Utc::now() - chrono::Duration::seconds(1);
        let item = manager
            .enqueue(Request::new(Method::Post, "https://example.com"), Some(past))
            .await
            .unwrap();

        manager.drain_once().await.unwrap();

        assert_eq!(store.statuses.lock().unwrap().as_slice(), &[(item.id.clone(), RequestStatus::Expired)]);
        assert!(manager.get(&item.id).await.unwrap().is_none());
        assert_eq!(sink.failed.lock().unwrap().as_slice(), &[item.id]);
    }

    struct StubEstimator;

    #[async_trait]
    impl crate::network::NetworkEstimator for StubEstimator {
        fn current_type(&self) -> crate::network::types::NetworkType {
            crate::network::types::NetworkType::Mobile4g
        }
        fn score(&self) -> f64 {
            0.0
        }
        async fn latency(&self) -> u64 {
            50
        }
        fn observe_failure(&self) {}
        fn status(&self) -> crate::network::types::NetworkStatus {
            crate::network::types::NetworkStatus {
                network_type: crate::network::types::NetworkType::Mobile4g,
                quality_score: 0.0,
                latency_ms: 50,
            }
        }
        fn subscribe(&self) -> futures_core::stream::BoxStream<'static, crate::network::types::NetworkStatus> {
            Box::pin(tokio_stream::iter(std::iter::empty()))
        }
    }

    struct StubSms;

    #[async_trait]
    impl crate::sms::transport::SmsTransport for StubSms {
        async fn send(&self, _gateway: &str, _text: &str) -> Result<bool> {
            Ok(true)
        }
        fn incoming(&self) -> futures_core::stream::BoxStream<'static, crate::sms::transport::IncomingSms> {
            Box::pin(tokio_stream::iter(std::iter::empty()))
        }
        async fn has_permissions(&self) -> bool {
            true
        }
        async fn request_permissions(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn completed_drain_cancels_the_items_escalation_timer() {
        use crate::sms::escalation::EscalationTimers;

        let store = Arc::new(InMemoryQueueStore::new());
        let http = Arc::new(ScriptedHttp {
            responses: StdMutex::new(vec![Ok(ok_response())]),
            calls: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let manager = Arc::new(QueueManager::new(Arc::clone(&store), http, sink, 10));

        let escalation = Arc::new(EscalationTimers::new(
            Arc::new(StubEstimator),
            Arc::clone(&store) as Arc<dyn QueueStore>,
            Arc::new(StubSms),
            "gateway",
            None,
            None,
        ));
        manager.set_escalation_timers(Arc::clone(&escalation));

        let item = manager.enqueue(Request::new(Method::Post, "https://example.com"), None).await.unwrap();
        escalation.arm(item.clone(), Duration::from_secs(600));
        assert_eq!(escalation.armed_count(), 1);

        manager.drain_once().await.unwrap();

        assert_eq!(escalation.armed_count(), 0, "drain completion must cancel the armed timer");
    }

    #[tokio::test]
    async fn expired_item_is_removed_and_reported_without_http_attempt() {
        let store = Arc::new(InMemoryQueueStore::new());
        let http = Arc::new(ScriptedHttp { responses: StdMutex::new(vec![]), calls: AtomicUsize::new(0) });
        let sink = Arc::new(RecordingSink::default());
        let manager = QueueManager::new(store, Arc::clone(&http), sink.clone(), 10);

        let now = Utc::now();
        let item = manager
            .enqueue(Request::new(Method::Post, "https://example.com"), Some(now - chrono::Duration::seconds(1)))
            .await
            .unwrap();

        manager.drain_once().await.unwrap();

        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.failed.lock().unwrap().as_slice(), &[item.id.clone()]);
        assert!(manager.get(&item.id).await.unwrap().is_none());
    }

    struct BroadcastEstimator(tokio::sync::broadcast::Sender<crate::network::types::NetworkStatus>);

    #[async_trait]
    impl crate::network::NetworkEstimator for BroadcastEstimator {
        fn current_type(&self) -> crate::network::types::NetworkType {
            crate::network::types::NetworkType::Mobile4g
        }
        fn score(&self) -> f64 {
            0.0
        }
        async fn latency(&self) -> u64 {
            50
        }
        fn observe_failure(&self) {}
        fn status(&self) -> crate::network::types::NetworkStatus {
            crate::network::types::NetworkStatus {
                network_type: crate::network::types::NetworkType::Mobile4g,
                quality_score: 0.0,
                latency_ms: 50,
            }
        }
        fn subscribe(&self) -> futures_core::stream::BoxStream<'static, crate::network::types::NetworkStatus> {
            use tokio_stream::wrappers::BroadcastStream;
            let stream = BroadcastStream::new(self.0.subscribe()).filter_map(|r| r.ok());
            Box::pin(stream)
        }
    }

    #[tokio::test]
    async fn network_stability_transition_triggers_an_immediate_drain() {
        let store = Arc::new(InMemoryQueueStore::new());
        let http = Arc::new(ScriptedHttp {
            responses: StdMutex::new(vec![Ok(ok_response())]),
            calls: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let manager = Arc::new(QueueManager::new(Arc::clone(&store), http, sink.clone(), 10));

        let (tx, _rx) = tokio::sync::broadcast::channel(8);
        manager.set_network_estimator(Arc::new(BroadcastEstimator(tx.clone())));
        manager.start_network_triggered_drain();

        let item = manager.enqueue(Request::new(Method::Post, "https://example.com"), None).await.unwrap();

        // An unstable transition must not trigger a drain.
        tx.send(crate::network::types::NetworkStatus {
            network_type: crate::network::types::NetworkType::Mobile2g,
            quality_score: 0.3,
            latency_ms: 50,
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.get(&item.id).await.unwrap().unwrap().status, RequestStatus::Pending);

        // A stable transition (score > 0.5) must.
        tx.send(crate::network::types::NetworkStatus {
            network_type: crate::network::types::NetworkType::Mobile4g,
            quality_score: 0.8,
            latency_ms: 50,
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(sink.completed.lock().unwrap().as_slice(), &[item.id.clone()]);
    }
}
