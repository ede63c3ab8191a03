//! Core data types shared by every other module: requests, responses, the
//! durable queue entity, id derivation, and the crate-wide error type.

pub mod ids;
pub mod queued_request;
pub mod request;
pub mod response;
pub mod result;

pub use queued_request::{QueuedRequest, RequestStatus};
pub use request::{Body, Method, Priority, Request};
pub use response::{Origin, Response};
pub use result::{Error, Result};
