//! Persistent queue store collaborator (spec §4.3).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::queued_request::{QueuedRequest, RequestStatus};
use crate::core::result::Result;

/// Durable, indexed storage for [`QueuedRequest`] (spec §4.3). All
/// operations are atomic per call. Only the Queue Manager writes to an
/// implementation of this trait (spec §5).
#[async_trait]
pub trait QueueStore: Send + Sync + 'static {
    /// Insert `item`. If `item.idempotency_key()` is `Some` and an existing
    /// non-terminal row carries the same key, that row is replaced (spec §4.3
    /// uniqueness contract).
    async fn insert(&self, item: QueuedRequest) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<QueuedRequest>>;

    async fn update_status(&self, id: &str, status: RequestStatus) -> Result<()>;

    async fn increment_retry(&self, id: &str) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete every non-terminal row whose `expires_at <= now`. Returns the
    /// deleted ids.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>>;

    /// Up to `limit` PENDING rows ordered by (priority DESC, created_at ASC).
    async fn list_pending(&self, limit: usize) -> Result<Vec<QueuedRequest>>;

    async fn count_pending(&self) -> Result<usize>;

    async fn clear_all(&self) -> Result<usize>;
}
