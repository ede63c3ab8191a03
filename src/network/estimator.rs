//! Network quality scoring (spec §4.1).
//!
//! `DefaultNetworkEstimator` is the reference implementation: it owns a
//! rolling failure window, delegates connectivity classification and
//! latency measurement to injected collaborators, and republishes
//! `NetworkStatus` on every transition via a broadcast channel — the same
//! fan-out-without-retention policy spec §5 calls out for the SMS
//! transport's inbound stream.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::stream::BoxStream;
use parking_lot::RwLock;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::network::connectivity::{ConnectivitySource, LatencyProbe};
use crate::network::types::{NetworkStatus, NetworkType};

const FAILURE_WINDOW: chrono::Duration = chrono::Duration::minutes(5);
const LOW_LATENCY_MS: u64 = 100;
const HIGH_LATENCY_MS: u64 = 1000;
const FAILURE_PENALTY: f64 = 0.1;
const LOW_LATENCY_BONUS: f64 = 0.1;
const HIGH_LATENCY_PENALTY: f64 = 0.2;

/// Core trait for network-quality estimation (spec §4.1).
#[async_trait]
pub trait NetworkEstimator: Send + Sync + 'static {
    fn current_type(&self) -> NetworkType;
    fn score(&self) -> f64;
    async fn latency(&self) -> u64;
    fn is_stable(&self) -> bool {
        self.score() >= 0.5
    }
    /// Append `now()` to the failure window. Never errors.
    fn observe_failure(&self);
    /// Current status as a one-shot read (not a subscription).
    fn status(&self) -> NetworkStatus;
    /// Stream that emits on every connectivity transition.
    fn subscribe(&self) -> BoxStream<'static, NetworkStatus>;
}

struct Inner {
    current_type: RwLock<NetworkType>,
    failures: RwLock<VecDeque<DateTime<Utc>>>,
    last_latency_ms: RwLock<u64>,
}

impl Inner {
    fn prune_failures(&self, now: DateTime<Utc>) {
        let mut failures = self.failures.write();
        while let Some(front) = failures.front() {
            if now.signed_duration_since(*front) > FAILURE_WINDOW {
                failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn failure_count(&self) -> usize {
        self.prune_failures(Utc::now());
        self.failures.read().len()
    }

    fn score_for(&self, network_type: NetworkType, latency_ms: u64) -> f64 {
        let base = network_type.base_score();
        if base == 0.0 {
            return 0.0;
        }
        let mut score = base;
        if latency_ms < LOW_LATENCY_MS {
            score += LOW_LATENCY_BONUS;
        } else if latency_ms > HIGH_LATENCY_MS {
            score -= HIGH_LATENCY_PENALTY;
        }
        score -= FAILURE_PENALTY * self.failure_count() as f64;
        score.clamp(0.0, 1.0)
    }
}

/// Reference [`NetworkEstimator`] implementation.
pub struct DefaultNetworkEstimator {
    inner: Arc<Inner>,
    sender: tokio::sync::broadcast::Sender<NetworkStatus>,
}

impl DefaultNetworkEstimator {
    /// Spawns a background task that follows `connectivity`'s transition
    /// stream and republishes a recomputed [`NetworkStatus`] on every change.
    pub fn new<C, L>(connectivity: Arc<C>, latency_probe: Arc<L>) -> Self
    where
        C: ConnectivitySource,
        L: LatencyProbe,
    {
        let inner = Arc::new(Inner {
            current_type: RwLock::new(NetworkType::Unknown),
            failures: RwLock::new(VecDeque::new()),
            last_latency_ms: RwLock::new(0),
        });
        let (sender, _) = tokio::sync::broadcast::channel(32);

        let task_inner = Arc::clone(&inner);
        let task_sender = sender.clone();
        let task_connectivity = Arc::clone(&connectivity);
        let task_probe = Arc::clone(&latency_probe);
        tokio::spawn(async move {
            let initial = task_connectivity.current().await;
            *task_inner.current_type.write() = initial;
            let mut stream = task_connectivity.subscribe();
            while let Some(network_type) = stream.next().await {
                *task_inner.current_type.write() = network_type;
                let latency_ms = task_probe.latency_ms().await;
                *task_inner.last_latency_ms.write() = latency_ms;
                let score = task_inner.score_for(network_type, latency_ms);
                let status = NetworkStatus { network_type, quality_score: score, latency_ms };
                tracing::debug!(?network_type, score, latency_ms, "network status transition");
                let _ = task_sender.send(status);
            }
        });

        Self { inner, sender }
    }
}

#[async_trait]
impl NetworkEstimator for DefaultNetworkEstimator {
    fn current_type(&self) -> NetworkType {
        *self.inner.current_type.read()
    }

    fn score(&self) -> f64 {
        let network_type = self.current_type();
        let latency_ms = *self.inner.last_latency_ms.read();
        self.inner.score_for(network_type, latency_ms)
    }

    async fn latency(&self) -> u64 {
        *self.inner.last_latency_ms.read()
    }

    fn observe_failure(&self) {
        self.inner.failures.write().push_back(Utc::now());
    }

    fn status(&self) -> NetworkStatus {
        NetworkStatus {
            network_type: self.current_type(),
            quality_score: self.score(),
            latency_ms: *self.inner.last_latency_ms.read(),
        }
    }

    fn subscribe(&self) -> BoxStream<'static, NetworkStatus> {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(|r| r.ok());
        Box::pin(stream)
    }
}
