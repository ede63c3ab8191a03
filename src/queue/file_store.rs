//! Durable [`QueueStore`] backed by a single JSON file.
//!
//! Mirrors the teacher's `FileActivityLogger`: create the parent directory
//! on demand, use `tokio::fs` for all I/O, and keep an in-memory mirror that
//! is rewritten to disk atomically (write-to-temp, then rename) on every
//! mutating call so a successful `insert` really does survive a crash
//! between the write and the next read (spec §4.3 durability contract).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::core::queued_request::{drain_order_key, QueuedRequest, RequestStatus};
use crate::core::result::{Error, Result};
use crate::queue::store::QueueStore;

pub struct JsonFileQueueStore {
    path: PathBuf,
    rows: RwLock<HashMap<String, QueuedRequest>>,
}

impl JsonFileQueueStore {
    /// Open (or create) the store backed by `path`. Loads any existing rows.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Store(format!("create directory {}: {e}", parent.display())))?;
        }

        let rows = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice::<Vec<QueuedRequest>>(&bytes)
                .map_err(|e| Error::Store(format!("corrupt queue file {}: {e}", path.display())))?
                .into_iter()
                .map(|row| (row.id.clone(), row))
                .collect(),
            _ => HashMap::new(),
        };

        Ok(Self { path, rows: RwLock::new(rows) })
    }

    async fn persist(&self, rows: &HashMap<String, QueuedRequest>) -> Result<()> {
        let values: Vec<&QueuedRequest> = rows.values().collect();
        let bytes = serde_json::to_vec_pretty(&values)
            .map_err(|e| Error::Store(format!("serialize queue: {e}")))?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| Error::Store(format!("write {}: {e}", tmp_path.display())))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| Error::Store(format!("rename {} -> {}: {e}", tmp_path.display(), self.path.display())))?;
        Ok(())
    }
}

#[async_trait]
impl QueueStore for JsonFileQueueStore {
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
        self.persist(&rows).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<QueuedRequest>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn update_status(&self, id: &str, status: RequestStatus) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(id) {
            row.status = status;
        }
        self.persist(&rows).await
    }

    async fn increment_retry(&self, id: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(id) {
            row.retry_count += 1;
        }
        self.persist(&rows).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.remove(id);
        self.persist(&rows).await
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
        if !expired.is_empty() {
            self.persist(&rows).await?;
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
        self.persist(&rows).await?;
        Ok(count)
    }
}
