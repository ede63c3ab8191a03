//! Shared test collaborators for the end-to-end scenarios (spec §8).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use driftline::network::types::{NetworkStatus, NetworkType};
use driftline::network::NetworkEstimator;
use driftline::queue::QueueEventSink;
use driftline::sms::transport::IncomingSms;
use driftline::sms::SmsTransport;
use driftline::transport::http::{HttpTransport, HttpTransportRequest, HttpTransportResponse};
use driftline::{Error, Result};
use futures_core::stream::BoxStream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Enable `tracing` output for a test run via `RUST_LOG`; a no-op after the
/// first call in the process (subscribers can only be installed once).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// A [`NetworkEstimator`] whose score can be flipped mid-test, emitting a
/// status transition on the subscribe stream the way a real connectivity
/// change would (spec §8 scenario 2: "Flip score ... and emit a stability
/// event").
pub struct ControllableEstimator {
    score_bits: AtomicU64,
    failures: AtomicUsize,
    sender: broadcast::Sender<NetworkStatus>,
}

impl ControllableEstimator {
    pub fn new(initial_score: f64) -> Arc<Self> {
        let (sender, _) = broadcast::channel(16);
        Arc::new(Self {
            score_bits: AtomicU64::new(initial_score.to_bits()),
            failures: AtomicUsize::new(0),
            sender,
        })
    }

    pub fn set_score(&self, score: f64) {
        self.score_bits.store(score.to_bits(), Ordering::SeqCst);
        let _ = self.sender.send(self.status());
    }
}

#[async_trait]
impl NetworkEstimator for ControllableEstimator {
    fn current_type(&self) -> NetworkType {
        NetworkType::Mobile4g
    }

    fn score(&self) -> f64 {
        f64::from_bits(self.score_bits.load(Ordering::SeqCst))
    }

    async fn latency(&self) -> u64 {
        50
    }

    fn observe_failure(&self) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn status(&self) -> NetworkStatus {
        NetworkStatus { network_type: self.current_type(), quality_score: self.score(), latency_ms: 50 }
    }

    fn subscribe(&self) -> BoxStream<'static, NetworkStatus> {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(|r| r.ok());
        Box::pin(stream)
    }
}

/// An [`HttpTransport`] whose single scripted outcome can be swapped
/// mid-test (e.g. to simulate the network recovering).
pub struct ScriptedHttp {
    response: Mutex<Result<HttpTransportResponse>>,
    calls: AtomicUsize,
}

impl ScriptedHttp {
    pub fn success() -> Arc<Self> {
        Arc::new(Self { response: Mutex::new(Ok(ok_response())), calls: AtomicUsize::new(0) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Err(Error::TransportError("refused".to_string()))),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn ok_response() -> HttpTransportResponse {
    HttpTransportResponse { status_code: 200, body: "ok".to_string(), headers: Default::default() }
}

#[async_trait]
impl HttpTransport for ScriptedHttp {
    async fn send(&self, _req: HttpTransportRequest, _timeout: Duration) -> Result<HttpTransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.lock().unwrap().clone()
    }
}

/// An [`SmsTransport`] that records every outbound text it is asked to send.
pub struct RecordingSms {
    succeed: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl RecordingSms {
    pub fn new(succeed: bool) -> Arc<Self> {
        Arc::new(Self { succeed: AtomicBool::new(succeed), sent: Mutex::new(Vec::new()) })
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsTransport for RecordingSms {
    async fn send(&self, _gateway: &str, text: &str) -> Result<bool> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(self.succeed.load(Ordering::SeqCst))
    }

    fn incoming(&self) -> BoxStream<'static, IncomingSms> {
        Box::pin(tokio_stream::iter(std::iter::empty()))
    }

    async fn has_permissions(&self) -> bool {
        true
    }

    async fn request_permissions(&self) -> bool {
        true
    }
}

/// A [`QueueEventSink`] that records ids passed to each callback, so tests
/// can assert "fires exactly once" (spec §8 scenario 2).
pub struct RecordingSink {
    pub completed: Mutex<Vec<String>>,
    pub failed: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { completed: Mutex::new(Vec::new()), failed: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl QueueEventSink for RecordingSink {
    async fn on_completed(&self, id: &str, _status_code: u16, _body: &str) {
        self.completed.lock().unwrap().push(id.to_string());
    }

    async fn on_failed(&self, id: &str, error: &str) {
        self.failed.lock().unwrap().push((id.to_string(), error.to_string()));
    }
}
