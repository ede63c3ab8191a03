//! The Router (spec §4.5): the single `execute()` entry point that samples
//! the network score and picks a delivery channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::core::request::{Priority, Request};
use crate::core::response::Response;
use crate::core::result::Result;
use crate::network::NetworkEstimator;
use crate::queue::manager::QueueManager;
use crate::router::strategy::{Strategy, StrategyParams};
use crate::sms::escalation::{build_sms_text, EscalationTimers};
use crate::sms::transport::SmsTransport;
use crate::transport::http::{HttpTransport, HttpTransportRequest};

/// The Router (spec §4.5). Holds no request state of its own — every
/// decision is a pure function of the current network score, the active
/// [`Strategy`], and the request at hand.
pub struct Router {
    queue: Arc<QueueManager>,
    http: Arc<dyn HttpTransport>,
    estimator: Arc<dyn NetworkEstimator>,
    sms_transport: Arc<dyn SmsTransport>,
    escalation: Arc<EscalationTimers>,
    strategy: RwLock<Strategy>,
    gateway: RwLock<String>,
    sms_enabled: AtomicBool,
}

impl Router {
    pub fn new(
        queue: Arc<QueueManager>,
        http: Arc<dyn HttpTransport>,
        estimator: Arc<dyn NetworkEstimator>,
        sms_transport: Arc<dyn SmsTransport>,
        escalation: Arc<EscalationTimers>,
        strategy: Strategy,
        gateway: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            http,
            estimator,
            sms_transport,
            escalation,
            strategy: RwLock::new(strategy),
            gateway: RwLock::new(gateway.into()),
            sms_enabled: AtomicBool::new(true),
        }
    }

    pub fn set_strategy(&self, strategy: Strategy) {
        *self.strategy.write() = strategy;
    }

    pub fn set_gateway(&self, gateway: impl Into<String>) {
        *self.gateway.write() = gateway.into();
    }

    pub fn gateway(&self) -> String {
        self.gateway.read().clone()
    }

    pub fn set_sms_enabled(&self, enabled: bool) {
        self.sms_enabled.store(enabled, Ordering::SeqCst);
        self.escalation.set_sms_enabled(enabled);
    }

    pub fn sms_enabled(&self) -> bool {
        self.sms_enabled.load(Ordering::SeqCst)
    }

    /// Spec §4.5: "The single entry point `execute(request) -> Response`."
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let params = self.strategy.read().params();
        let score = self.estimator.score();

        if score > params.http_threshold {
            return self.attempt_http_then_fallback(request, params.http_timeout, &params).await;
        }

        if let (Some(short_threshold), Some(short_timeout)) =
            (params.short_http_threshold, params.short_http_timeout)
        {
            if score > short_threshold {
                return self.attempt_http_then_fallback(request, short_timeout, &params).await;
            }
        }

        if score == 0.0 {
            return self.route_no_connectivity(request, &params).await;
        }

        // 0 < score <= threshold without an HTTP attempt (spec §4.5 step 5:
        // the non-BALANCED strategies' single-threshold band).
        self.enqueue_with_optional_escalation(request, &params).await
    }

    async fn attempt_http_then_fallback(
        &self,
        request: Request,
        timeout: Duration,
        params: &StrategyParams,
    ) -> Result<Response> {
        let transport_request = HttpTransportRequest::from_request(&request);
        match self.http.send(transport_request, timeout).await {
            Ok(response) if response.is_success() => {
                if let Some(id) = request.idempotency_key.clone() {
                    self.escalation.cancel(&id);
                }
                Ok(Response::network(response.status_code, response.body, response.headers))
            }
            Ok(_) | Err(_) => {
                self.estimator.observe_failure();
                self.enqueue_with_optional_escalation(request, params).await
            }
        }
    }

    /// Spec §4.5 step 4: `score == 0`.
    async fn route_no_connectivity(&self, request: Request, params: &StrategyParams) -> Result<Response> {
        if self.sms_enabled()
            && request.sms_eligible
            && params.eligible_for_immediate_sms(request.priority)
        {
            return self.send_sms_immediate(request).await;
        }
        self.enqueue_with_optional_escalation(request, params).await
    }

    /// Enqueue `request`; arm an escalation timer only if SMS is enabled,
    /// the request opted in, and its priority qualifies under `params`
    /// (spec §4.5 steps 4-5).
    async fn enqueue_with_optional_escalation(&self, request: Request, params: &StrategyParams) -> Result<Response> {
        let arm = self.sms_enabled() && request.sms_eligible && params.eligible_for_escalation(request.priority);
        let item = self.queue.enqueue(request, None).await?;
        if arm {
            self.escalation.arm(item, params.sms_escalation_delay);
        }
        Ok(Response::queued())
    }

    /// Spec §4.6: the SMS immediate path.
    async fn send_sms_immediate(&self, request: Request) -> Result<Response> {
        let item = self.queue.enqueue(request, None).await?;
        let text = match build_sms_text(&item) {
            Ok(text) => text,
            Err(err) => {
                // SMS_TOO_LARGE (or any other encode failure) is internal per spec §7:
                // the item stays queued for the normal drain/escalation path instead
                // of surfacing an error to the caller.
                tracing::warn!(id = %item.id, error = %err, "immediate SMS encode failed, leaving request queued");
                return Ok(Response::sms_failed());
            }
        };
        let gateway = self.gateway();
        match self.sms_transport.send(&gateway, &text).await {
            Ok(true) => {
                self.queue.store().delete(&item.id).await?;
                Ok(Response::sms_delivered())
            }
            Ok(false) | Err(_) => Ok(Response::sms_failed()),
        }
    }
}
