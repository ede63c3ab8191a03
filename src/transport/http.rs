//! HTTP transport adapter collaborator (spec §4.4, §6): the network side
//! of the Queue Manager's drain pass and the Router's direct-send path.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::request::{Method, Request};
use crate::core::result::{Error, Result};

/// Wire-level request handed to an [`HttpTransport`]. Deliberately simpler
/// than [`Request`] — no priority/sms_eligible/idempotency_key, since those
/// are Router/Queue Manager concerns, not transport concerns.
#[derive(Debug, Clone)]
pub struct HttpTransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

/// Default header carrying [`Request::idempotency_key`] downstream (spec §9:
/// "Implementers must send idempotency_key in an outgoing header ... when
/// present — this is the only way duplicate SMS-then-HTTP deliveries are
/// deduplicated end-to-end").
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

impl HttpTransportRequest {
    pub fn from_request(request: &Request) -> Self {
        let body = request
            .body
            .as_ref()
            .and_then(|body| serde_json::to_vec(body).ok());
        let mut headers = request.headers.clone();
        if let Some(key) = &request.idempotency_key {
            headers
                .entry(IDEMPOTENCY_KEY_HEADER.to_string())
                .or_insert_with(|| key.clone());
        }
        Self {
            method: request.method,
            url: request.url.clone(),
            headers,
            body,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpTransportResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpTransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// HTTP transport collaborator (spec §6). Implementations race the attempt
/// against `timeout` and surface `Error::Timeout`/`Error::TransportError`
/// rather than panicking — the Router and Queue Manager both treat those
/// uniformly (spec §7: transport errors degrade to CACHE-QUEUED/retry, they
/// are never fatal).
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn send(&self, request: HttpTransportRequest, timeout: Duration) -> Result<HttpTransportResponse>;
}

/// Default [`HttpTransport`] built on `reqwest`, gated behind the
/// `reqwest-transport` feature (on by default).
#[cfg(feature = "reqwest-transport")]
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest-transport")]
impl ReqwestHttpTransport {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[cfg(feature = "reqwest-transport")]
impl Default for ReqwestHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "reqwest-transport")]
#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpTransportRequest, timeout: Duration) -> Result<HttpTransportResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                Error::Timeout(timeout)
            } else {
                Error::TransportError(err.to_string())
            }
        })?;

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|err| Error::TransportError(err.to_string()))?;

        Ok(HttpTransportResponse { status_code, headers, body })
    }
}
