//! The public entry point (spec §6): wires the Router, Queue Manager, and
//! escalation timers together behind one value a host application owns and
//! calls `execute()` on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::request::{Body, Method, Request};
use crate::core::response::Response;
use crate::core::result::{Error, Result};
use crate::network::types::NetworkStatus;
use crate::network::NetworkEstimator;
use crate::queue::manager::{QueueEventSink, TracingEventSink};
use crate::queue::memory_store::InMemoryQueueStore;
use crate::queue::{QueueManager, QueueStore};
use crate::router::{MiddlewareConfig, Router, Strategy};
use crate::sms::escalation::{CostProvider, CostWarningCallback, EscalationTimers};
use crate::sms::transport::SmsTransport;
use crate::transport::http::HttpTransport;

/// Builds a [`Middleware`] from its collaborators, mirroring the teacher's
/// `OSLFrameworkBuilder` `with_*` convention. The network estimator, HTTP
/// transport, and SMS transport have no safe crate-provided default (spec
/// §1/§6: all three are host-supplied) and so are constructor arguments;
/// the persistent store defaults to [`InMemoryQueueStore`] if unset.
pub struct MiddlewareBuilder {
    estimator: Arc<dyn NetworkEstimator>,
    http: Arc<dyn HttpTransport>,
    sms_transport: Arc<dyn SmsTransport>,
    store: Option<Arc<dyn QueueStore>>,
    sink: Option<Arc<dyn QueueEventSink>>,
    retry_timeout: Option<std::time::Duration>,
    config: MiddlewareConfig,
}

impl MiddlewareBuilder {
    pub fn new(
        estimator: Arc<dyn NetworkEstimator>,
        http: Arc<dyn HttpTransport>,
        sms_transport: Arc<dyn SmsTransport>,
    ) -> Self {
        Self {
            estimator,
            http,
            sms_transport,
            store: None,
            sink: None,
            retry_timeout: None,
            config: MiddlewareConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn QueueEventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Spec §6 `configure(sms_cost_provider?)`: the initial collaborator,
    /// stored on [`MiddlewareConfig`] so later `configure()` calls can replace it.
    pub fn with_cost_provider(mut self, provider: Arc<dyn CostProvider>) -> Self {
        self.config.sms_cost_provider = Some(provider);
        self
    }

    pub fn with_cost_warning_callback(mut self, callback: Arc<dyn CostWarningCallback>) -> Self {
        self.config.sms_cost_warning = Some(callback);
        self
    }

    /// Override the queue manager's periodic drain interval.
    pub fn with_retry_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.retry_timeout = Some(timeout);
        self
    }

    pub fn with_config(mut self, config: MiddlewareConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Middleware {
        let store = self.store.unwrap_or_else(|| Arc::new(InMemoryQueueStore::new()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingEventSink));

        let mut queue = QueueManager::new(
            Arc::clone(&store),
            Arc::clone(&self.http),
            sink,
            self.config.max_queue_size,
        );
        if let Some(timeout) = self.retry_timeout {
            queue = queue.with_retry_timeout(timeout);
        }
        let queue = Arc::new(queue);
        queue.set_network_estimator(Arc::clone(&self.estimator));

        let escalation = Arc::new(EscalationTimers::new(
            Arc::clone(&self.estimator),
            Arc::clone(&store),
            Arc::clone(&self.sms_transport),
            self.config.sms_gateway.clone(),
            self.config.sms_cost_provider.clone(),
            self.config.sms_cost_warning.clone(),
        ));
        queue.set_escalation_timers(Arc::clone(&escalation));

        let router = Arc::new(Router::new(
            Arc::clone(&queue),
            Arc::clone(&self.http),
            Arc::clone(&self.estimator),
            Arc::clone(&self.sms_transport),
            Arc::clone(&escalation),
            self.config.strategy.clone(),
            self.config.sms_gateway.clone(),
        ));

        Middleware {
            config: RwLock::new(self.config),
            router,
            queue,
            estimator: self.estimator,
            sms_transport: self.sms_transport,
            escalation,
            initialized: AtomicBool::new(false),
        }
    }
}

/// The single owning value a host application constructs once and threads
/// through its code (spec §9: "hidden global state is forbidden").
pub struct Middleware {
    config: RwLock<MiddlewareConfig>,
    router: Arc<Router>,
    queue: Arc<QueueManager>,
    estimator: Arc<dyn NetworkEstimator>,
    sms_transport: Arc<dyn SmsTransport>,
    escalation: Arc<EscalationTimers>,
    initialized: AtomicBool,
}

impl Middleware {
    pub fn builder(
        estimator: Arc<dyn NetworkEstimator>,
        http: Arc<dyn HttpTransport>,
        sms_transport: Arc<dyn SmsTransport>,
    ) -> MiddlewareBuilder {
        MiddlewareBuilder::new(estimator, http, sms_transport)
    }

    /// Idempotent: a repeat call logs and returns rather than re-arming the
    /// background drain loop (spec §6).
    pub async fn initialize(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!("middleware already initialized; ignoring repeat call");
            return Ok(());
        }
        self.apply_config(&self.config.read().clone());
        self.queue.start_background_loop();
        self.queue.start_network_triggered_drain();
        tracing::info!("middleware initialized");
        Ok(())
    }

    /// Tear down the background drain loop and any armed escalation timers
    /// (spec §5 `dispose()`).
    pub async fn dispose(&self) {
        self.queue.stop_background_loop().await;
        self.escalation.cancel_all();
        self.initialized.store(false, Ordering::SeqCst);
    }

    fn apply_config(&self, config: &MiddlewareConfig) {
        self.router.set_strategy(config.strategy.clone());
        self.router.set_gateway(config.sms_gateway.clone());
        self.router.set_sms_enabled(config.sms_enabled);
        self.queue.set_max_queue_size(config.max_queue_size);
        self.escalation.set_cost_provider(config.sms_cost_provider.clone());
        self.escalation.set_cost_warning_callback(config.sms_cost_warning.clone());
    }

    /// Spec §6 `configure(...)`: replace the live configuration.
    pub fn configure(&self, config: MiddlewareConfig) -> Result<()> {
        self.ensure_initialized()?;
        self.apply_config(&config);
        *self.config.write() = config;
        Ok(())
    }

    pub fn config_snapshot(&self) -> MiddlewareConfig {
        self.config.read().clone()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Spec §6 `execute(Request) -> Response`: the single dispatch entry point.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.ensure_initialized()?;
        self.router.execute(request).await
    }

    pub fn get_network_status(&self) -> Result<NetworkStatus> {
        self.ensure_initialized()?;
        Ok(self.estimator.status())
    }

    pub async fn get_queue_count(&self) -> Result<usize> {
        self.ensure_initialized()?;
        self.queue.count_pending().await
    }

    pub async fn list_pending(&self, limit: usize) -> Result<Vec<crate::core::QueuedRequest>> {
        self.ensure_initialized()?;
        self.queue.list_pending(limit).await
    }

    /// Run one drain pass on demand (spec §6 `process_queue()`).
    pub async fn process_queue(&self) -> Result<()> {
        self.ensure_initialized()?;
        self.queue.drain_once().await
    }

    /// Spec §6 `clear_queue() -> int`.
    pub async fn clear_queue(&self) -> Result<usize> {
        self.ensure_initialized()?;
        self.queue.clear().await
    }

    pub async fn has_sms_permissions(&self) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.sms_transport.has_permissions().await)
    }

    pub async fn request_sms_permissions(&self) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.sms_transport.request_permissions().await)
    }

    pub fn sms_gateway(&self) -> Result<String> {
        self.ensure_initialized()?;
        Ok(self.router.gateway())
    }

    /// Thin helper: `GET url`, delegating to [`Middleware::execute`].
    pub async fn get(&self, url: impl Into<String>) -> Result<Response> {
        self.execute(Request::new(Method::Get, url)).await
    }

    /// Thin helper: `POST url`, with `Content-Type: application/json` set
    /// when `body` is present and no header was already supplied.
    pub async fn post(&self, url: impl Into<String>, body: Option<Body>) -> Result<Response> {
        self.execute(self.with_optional_body(Method::Post, url, body)).await
    }

    pub async fn put(&self, url: impl Into<String>, body: Option<Body>) -> Result<Response> {
        self.execute(self.with_optional_body(Method::Put, url, body)).await
    }

    pub async fn delete(&self, url: impl Into<String>) -> Result<Response> {
        self.execute(Request::new(Method::Delete, url)).await
    }

    fn with_optional_body(&self, method: Method, url: impl Into<String>, body: Option<Body>) -> Request {
        let mut request = Request::new(method, url);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        request.ensure_json_content_type()
    }
}
