//! Deterministic id derivation for queued requests (spec §4.4).

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::core::request::{Method, Request};

/// `sha256(method || url || millis_since_epoch)` truncated to 16 hex chars.
///
/// Distinct across retries by construction (the timestamp changes), which is
/// exactly why the spec separates this from `idempotency_key`: this value is
/// the *storage row* identity, not the cross-attempt logical identity.
pub fn derive_id(method: Method, url: &str, created_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(url.as_bytes());
    hasher.update(created_at.timestamp_millis().to_le_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// The id a queued request should carry: its `idempotency_key` if the caller
/// supplied one, otherwise a freshly derived id.
pub fn queue_id(request: &Request, created_at: DateTime<Utc>) -> String {
    request
        .idempotency_key
        .clone()
        .unwrap_or_else(|| derive_id(request.method, &request.url, created_at))
}
