//! Collaborator traits the host application implements: a connectivity
//! event source and a latency probe. Both are out of scope per spec §1
//! ("the concrete ... transport") — the middleware only consumes them.

use async_trait::async_trait;
use futures_core::stream::BoxStream;

use crate::network::types::NetworkType;

/// Event stream of connectivity kind changes, plus a point query for the
/// current kind (spec §4.1 `current_type()`, §6 "Connectivity source").
#[async_trait]
pub trait ConnectivitySource: Send + Sync + 'static {
    /// Current connectivity kind. Must never error: an implementation that
    /// cannot determine connectivity should report [`NetworkType::Unknown`].
    async fn current(&self) -> NetworkType;

    /// Stream of connectivity kind transitions. Implementations should emit
    /// only on *change*, not on every poll.
    fn subscribe(&self) -> BoxStream<'static, NetworkType>;
}

/// Pluggable latency probe (spec §4.1: "measured by periodic probe to a
/// configured reliable endpoint; caller-pluggable; default implementation
/// may return a constant placeholder").
#[async_trait]
pub trait LatencyProbe: Send + Sync + 'static {
    /// Measured round-trip time in milliseconds. Never errors; a failed
    /// probe should be reported as a large latency so the estimator's
    /// scoring naturally penalizes it, not surfaced as an `Err`.
    async fn latency_ms(&self) -> u64;
}

/// Default placeholder probe: no network access, constant value. Resolves
/// the §9 open question "the latency probe has no defined endpoint" by
/// requiring callers who care about real latency to supply their own
/// [`LatencyProbe`]; this default keeps the estimator usable out of the box.
#[derive(Debug, Clone, Copy)]
pub struct ConstantLatencyProbe(pub u64);

impl Default for ConstantLatencyProbe {
    fn default() -> Self {
        Self(50)
    }
}

#[async_trait]
impl LatencyProbe for ConstantLatencyProbe {
    async fn latency_ms(&self) -> u64 {
        self.0
    }
}
