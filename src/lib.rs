//! Client-side resilience middleware for intermittent-connectivity mobile
//! apps: scores network quality, and routes each outbound request over a
//! direct HTTP attempt, a durable local queue with background retry, or an
//! SMS fallback transport, depending on how good the network currently is.
//!
//! The [`Middleware`] value is the intended entry point; everything else is
//! a collaborator it wires together and that can also be used standalone
//! (the SMS codec in [`sms::codec`], for instance, has no dependency on the
//! rest of the crate).

pub mod core;
pub mod middleware;
pub mod network;
pub mod queue;
pub mod router;
pub mod sms;
pub mod transport;

pub use core::{Body, Error, Method, Origin, Priority, QueuedRequest, Request, RequestStatus, Response, Result};
pub use middleware::{Middleware, MiddlewareBuilder};
pub use network::{NetworkEstimator, NetworkStatus, NetworkType};
pub use queue::{QueueEventSink, QueueManager, QueueStore};
pub use router::{MiddlewareConfig, Router, Strategy};
pub use sms::{SmsTransport, IncomingSms};
