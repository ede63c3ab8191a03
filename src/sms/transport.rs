//! SMS transport collaborator trait (spec §6) and the inbound message shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::core::result::Result;

/// An inbound SMS delivered by the transport (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingSms {
    pub address: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub service_center: Option<String>,
}

/// Platform SMS transport collaborator. Out of scope per spec §1 ("the
/// concrete SMS send/receive transport (abstracted as an interface)") — the
/// middleware never ships a default implementation of this trait, only the
/// codec and escalation logic that sit on top of it.
#[async_trait]
pub trait SmsTransport: Send + Sync + 'static {
    /// Send `text` to `gateway`. Returns `Ok(true)` on confirmed handoff to
    /// the carrier, `Ok(false)` on a soft failure the caller should not
    /// retry immediately, `Err` for permission or transport errors.
    async fn send(&self, gateway: &str, text: &str) -> Result<bool>;

    /// Broadcast stream of inbound messages; fanned out without retention
    /// (spec §5) — a subscriber that is not listening misses messages sent
    /// before it subscribed.
    fn incoming(&self) -> BoxStream<'static, IncomingSms>;

    async fn has_permissions(&self) -> bool;

    async fn request_permissions(&self) -> bool;
}
