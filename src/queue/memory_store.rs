//! Volatile reference [`QueueStore`] — no durability, used in tests and
//! examples. Mirrors the teacher's `ConsoleActivityLogger`: the simplest
//! backend for a pluggable trait, not meant for production use.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::core::queued_request::{drain_order_key, QueuedRequest, RequestStatus};
use crate::core::result::Result;
use crate::queue::store::QueueStore;

#[derive(Default)]
pub struct InMemoryQueueStore {
    rows: RwLock<HashMap<String, QueuedRequest>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn insert(&self, item: QueuedRequest) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(key) = item.idempotency_key() {
            let key = key.to_string();
            let existing_id = rows
                .values()
                .find(|row| row.idempotency_key() == Some(key.as_str()))
                .map(|row| row.id.clone());
            if let Some(existing_id) = existing_id {
                rows.remove(&existing_id);
            }
        }
        rows.insert(item.id.clone(), item);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<QueuedRequest>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn update_status(&self, id: &str, status: RequestStatus) -> Result<()> {
        if let Some(row) = self.rows.write().await.get_mut(id) {
            row.status = status;
        }
        Ok(())
    }

    async fn increment_retry(&self, id: &str) -> Result<()> {
        if let Some(row) = self.rows.write().await.get_mut(id) {
            row.retry_count += 1;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.rows.write().await.remove(id);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut rows = self.rows.write().await;
        let expired: Vec<String> = rows
            .values()
            .filter(|row| row.is_expired(now))
            .map(|row| row.id.clone())
            .collect();
        for id in &expired {
            rows.remove(id);
        }
        Ok(expired)
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<QueuedRequest>> {
        let rows = self.rows.read().await;
        let mut pending: Vec<QueuedRequest> = rows
            .values()
            .filter(|row| row.status == RequestStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(drain_order_key);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn count_pending(&self) -> Result<usize> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| row.status == RequestStatus::Pending || row.status == RequestStatus::Processing)
            .count())
    }

    async fn clear_all(&self) -> Result<usize> {
        let mut rows = self.rows.write().await;
        let count = rows.len();
        rows.clear();
        Ok(count)
    }
}
