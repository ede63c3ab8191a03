//! The `Response` value returned synchronously from every `execute()` call.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which delivery channel produced a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Delivered over a live HTTP attempt.
    Network,
    /// Accepted durably; delivery is pending in the background queue.
    CacheQueued,
    /// Delivered by SMS (immediate or escalated).
    Sms,
}

/// Response returned to the caller of `execute()`. Always produced — the
/// caller never sees a raw transport error; see spec §7 propagation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status_code: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
    pub origin: Origin,
}

impl Response {
    pub fn network(status_code: u16, body: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            headers,
            origin: Origin::Network,
        }
    }

    /// `202 origin=CACHE-QUEUED`: accepted, retry in progress.
    pub fn queued() -> Self {
        Self {
            status_code: 202,
            body: String::new(),
            headers: HashMap::new(),
            origin: Origin::CacheQueued,
        }
    }

    /// `200 origin=SMS`: delivered by SMS.
    pub fn sms_delivered() -> Self {
        Self {
            status_code: 200,
            body: String::new(),
            headers: HashMap::new(),
            origin: Origin::Sms,
        }
    }

    /// `503 origin=SMS`: SMS send attempt failed, no other channel succeeded.
    pub fn sms_failed() -> Self {
        Self {
            status_code: 503,
            body: String::new(),
            headers: HashMap::new(),
            origin: Origin::Sms,
        }
    }

    /// True for `<300` NETWORK responses (spec §7: "delivered").
    pub fn is_delivered(&self) -> bool {
        matches!(self.origin, Origin::Network) && self.status_code < 300
    }

    /// True for `202 origin=CACHE-QUEUED` (spec §7: "accepted, retry in progress").
    pub fn is_queued(&self) -> bool {
        matches!(self.origin, Origin::CacheQueued) && self.status_code == 202
    }
}
