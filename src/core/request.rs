//! The caller-facing `Request` value and its small supporting enums.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// HTTP method supported by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Upper-case wire representation, e.g. for logging or the underlying transport.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority. Numeric value doubles as the drain-ordering weight
/// (spec §3: "priority DESC") and as the escalation-eligibility threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low = 3,
    Normal = 5,
    High = 8,
    Critical = 10,
}

impl Priority {
    pub fn weight(&self) -> u8 {
        *self as u8
    }
}

/// Structured request body: a flat key-value map, or no body at all.
///
/// The original application domain is financial transactions with small,
/// flat payloads (amount, user, auth token) — the SMS codec in
/// [`crate::sms::codec`] depends on this shape to extract the fields it
/// compresses, so arbitrary nested JSON is intentionally not supported here.
pub type Body = HashMap<String, serde_json::Value>;

/// A caller-submitted request. Immutable once constructed; `Clone` because
/// the Router, Queue Manager, and SMS path all need their own copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Body>,
    pub priority: Priority,
    pub sms_eligible: bool,
    pub idempotency_key: Option<String>,
    #[serde(with = "duration_millis_opt")]
    pub timeout: Option<std::time::Duration>,
}

impl Request {
    /// Construct a request with NORMAL priority, not SMS-eligible, no
    /// idempotency key, and no explicit timeout override. Use the
    /// `with_*` builders below for everything else.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            priority: Priority::Normal,
            sms_eligible: false,
            idempotency_key: None,
            timeout: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_sms_eligible(mut self, eligible: bool) -> Self {
        self.sms_eligible = eligible;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Default `Content-Type` for the thin HTTP helpers (spec §6: POST/PUT
    /// set `application/json` when unset).
    pub(crate) fn ensure_json_content_type(mut self) -> Self {
        if matches!(self.method, Method::Post | Method::Put)
            && !self.headers.keys().any(|k| k.eq_ignore_ascii_case("content-type"))
        {
            self.headers
                .insert("Content-Type".to_string(), "application/json".to_string());
        }
        self
    }
}

mod duration_millis_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_some(&value.map(|d| d.as_millis() as u64))
            .or_else(|_| s.serialize_none())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let millis: Option<u64> = Option::deserialize(d)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain_sets_expected_fields() {
        let req = Request::new(Method::Post, "https://example.com/transfer")
            .with_priority(Priority::Critical)
            .with_sms_eligible(true)
            .with_idempotency_key("tx-42");

        assert_eq!(req.priority, Priority::Critical);
        assert!(req.sms_eligible);
        assert_eq!(req.idempotency_key.as_deref(), Some("tx-42"));
    }

    #[test]
    fn json_content_type_added_only_for_post_put_when_unset() {
        let post = Request::new(Method::Post, "u").ensure_json_content_type();
        assert_eq!(post.headers.get("Content-Type").map(String::as_str), Some("application/json"));

        let get = Request::new(Method::Get, "u").ensure_json_content_type();
        assert!(get.headers.get("Content-Type").is_none());

        let custom = Request::new(Method::Put, "u")
            .with_header("Content-Type", "text/plain")
            .ensure_json_content_type();
        assert_eq!(custom.headers.get("Content-Type").map(String::as_str), Some("text/plain"));
    }

    #[test]
    fn priority_ordering_matches_spec_weights() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::Critical.weight(), 10);
    }

    #[test]
    fn request_round_trips_through_json() {
        let req = Request::new(Method::Post, "https://example.com")
            .with_timeout(std::time::Duration::from_secs(5))
            .with_body(Body::from([("amount".to_string(), serde_json::json!(500))]));

        let json = serde_json::to_string(&req).expect("serialize");
        let back: Request = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(back.url, req.url);
        assert_eq!(back.timeout, req.timeout);
        assert_eq!(back.body, req.body);
    }
}
