//! HTTP transport collaborator (spec §4.4, §6).

pub mod http;

pub use http::{HttpTransport, HttpTransportRequest, HttpTransportResponse};

#[cfg(feature = "reqwest-transport")]
pub use http::ReqwestHttpTransport;
