//! SMS escalation timers (spec §4.7): a one-shot deferred fallback armed
//! when a request is queued with `sms_eligible` under a strategy that wants
//! a delayed SMS attempt.
//!
//! Bookkeeping uses a `dashmap::DashMap` keyed by queued-request id, the
//! same concurrent-map choice the sibling `airssys-rt` crate makes for its
//! actor registry — appropriate here for the same reason: many timers are
//! armed and cancelled independently under a multi-threaded tokio runtime,
//! with no natural single owner to hold a plain `Mutex<HashMap<_>>` across
//! `.await` points.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::core::queued_request::QueuedRequest;
use crate::network::NetworkEstimator;
use crate::queue::store::QueueStore;
use crate::sms::codec::{self, SmsRequest};
use crate::sms::transport::SmsTransport;

/// Estimates the monetary cost of sending `text` (spec §6 "Cost provider").
pub trait CostProvider: Send + Sync + 'static {
    fn estimate(&self, text: &str) -> f64;
}

/// Approves or refuses a cost estimate before the escalation timer sends
/// (spec §6 "cost warning callback").
pub trait CostWarningCallback: Send + Sync + 'static {
    fn approve(&self, estimate: f64) -> bool;
}

/// Manages the `request_id -> timer_handle` map described in spec §9
/// ("Implementations should hold a mapping request_id -> timer_handle;
/// cancellation removes and aborts").
pub struct EscalationTimers {
    handles: DashMap<String, JoinHandle<()>>,
    estimator: Arc<dyn NetworkEstimator>,
    store: Arc<dyn QueueStore>,
    sms_transport: Arc<dyn SmsTransport>,
    cost_provider: parking_lot::RwLock<Option<Arc<dyn CostProvider>>>,
    cost_warning: parking_lot::RwLock<Option<Arc<dyn CostWarningCallback>>>,
    gateway: String,
    enable_sms: std::sync::atomic::AtomicBool,
}

impl EscalationTimers {
    pub fn new(
        estimator: Arc<dyn NetworkEstimator>,
        store: Arc<dyn QueueStore>,
        sms_transport: Arc<dyn SmsTransport>,
        gateway: impl Into<String>,
        cost_provider: Option<Arc<dyn CostProvider>>,
        cost_warning: Option<Arc<dyn CostWarningCallback>>,
    ) -> Self {
        Self {
            handles: DashMap::new(),
            estimator,
            store,
            sms_transport,
            cost_provider: parking_lot::RwLock::new(cost_provider),
            cost_warning: parking_lot::RwLock::new(cost_warning),
            gateway: gateway.into(),
            enable_sms: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn set_sms_enabled(&self, enabled: bool) {
        self.enable_sms.store(enabled, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_sms_enabled(&self) -> bool {
        self.enable_sms.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Replace the cost-estimation collaborator at runtime (spec §6
    /// `configure(sms_cost_provider?)`).
    pub fn set_cost_provider(&self, provider: Option<Arc<dyn CostProvider>>) {
        *self.cost_provider.write() = provider;
    }

    /// Replace the cost-approval collaborator at runtime (spec §6
    /// `configure(sms_cost_warning_callback?)`).
    pub fn set_cost_warning_callback(&self, callback: Option<Arc<dyn CostWarningCallback>>) {
        *self.cost_warning.write() = callback;
    }

    /// Arm a one-shot timer for `item` that fires at `now + delay`.
    ///
    /// On fire: re-sample the network score; if it is still `< 0.3`, SMS
    /// remains enabled, the request is still `sms_eligible`, and the item
    /// is still pending in the store, optionally ask the cost-warning
    /// collaborator, then send via the codec + transport (spec §4.7).
    pub fn arm(self: &Arc<Self>, item: QueuedRequest, delay: Duration) {
        let this = Arc::clone(self);
        let id = item.id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.handles.remove(&id);
            this.fire(item).await;
        });
        self.handles.insert(id, handle);
    }

    /// Cancel any live timer for `id` (spec §4.7: any successful HTTP
    /// delivery, or a completed drain of the item, cancels its timer).
    pub fn cancel(&self, id: &str) {
        if let Some((_, handle)) = self.handles.remove(id) {
            handle.abort();
        }
    }

    /// Cancel every live timer (spec §5 `dispose()`).
    pub fn cancel_all(&self) {
        for entry in self.handles.iter() {
            entry.value().abort();
        }
        self.handles.clear();
    }

    pub fn armed_count(&self) -> usize {
        self.handles.len()
    }

    async fn fire(&self, item: QueuedRequest) {
        if self.estimator.score() >= 0.3 {
            return;
        }
        if !self.enable_sms.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        if !item.request.sms_eligible {
            return;
        }
        match self.store.get_by_id(&item.id).await {
            Ok(Some(stored)) if stored.status == crate::core::RequestStatus::Pending => {}
            _ => return,
        }

        let text = match build_sms_text(&item) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(id = %item.id, error = %err, "escalation encode failed");
                return;
            }
        };

        let provider = self.cost_provider.read().clone();
        if let Some(provider) = provider {
            let estimate = provider.estimate(&text);
            let warning = self.cost_warning.read().clone();
            if let Some(warning) = warning {
                if !warning.approve(estimate) {
                    tracing::info!(id = %item.id, estimate, "escalation SMS refused by cost warning");
                    return;
                }
            }
        }

        match self.sms_transport.send(&self.gateway, &text).await {
            Ok(true) => tracing::info!(id = %item.id, "escalation SMS sent"),
            Ok(false) | Err(_) => tracing::warn!(id = %item.id, "escalation SMS send failed"),
        }
    }
}

/// Build the codec's wire text for a queued request's body (amount/user/auth
/// are pulled from well-known body keys; spec §4.6 example payload shape).
pub fn build_sms_text(item: &QueuedRequest) -> crate::core::Result<String> {
    let body = item.request.body.as_ref();
    let field = |key: &str| -> String {
        body.and_then(|b| b.get(key))
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_default()
    };
    let command = url_last_segment(&item.request.url).to_ascii_uppercase();
    let req = SmsRequest::new(command, item.id.clone(), field("amount"), field("user"), field("auth"));
    codec::encode(&req)
}

fn url_last_segment(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}
