//! The durable entity the Queue Manager owns and mutates (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ids::queue_id;
use crate::core::request::{Priority, Request};

/// Lifecycle state of a [`QueuedRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Expired,
}

/// A request that has been accepted into the durable queue.
///
/// `retry_count` and `status` are mutated only by the Queue Manager during a
/// drain pass (spec §3 invariant: "mutated only by Queue Manager state
/// transitions").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: String,
    pub request: Request,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: RequestStatus,
}

impl QueuedRequest {
    /// `max_retries` is 5 for CRITICAL priority, 3 otherwise (spec §4.4).
    pub fn new(request: Request, created_at: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Self {
        let id = queue_id(&request, created_at);
        let max_retries = if request.priority == Priority::Critical { 5 } else { 3 };
        Self {
            id,
            request,
            retry_count: 0,
            max_retries,
            created_at,
            expires_at,
            status: RequestStatus::Pending,
        }
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.request.idempotency_key.as_deref()
    }

    /// Spec §3: "expires_at, when set and in the past, forces EXPIRED on
    /// next inspection regardless of retry budget."
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }

    /// Spec §3: "retry_count <= max_retries; reaching equality transitions
    /// to FAILED on next failed attempt."
    pub fn retry_budget_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Ordering key for drain passes: (priority DESC, created_at ASC) per spec §3/§4.4.
pub fn drain_order_key(item: &QueuedRequest) -> (std::cmp::Reverse<u8>, DateTime<Utc>) {
    (std::cmp::Reverse(item.request.priority.weight()), item.created_at)
}
