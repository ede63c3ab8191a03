//! Network quality estimation (spec §4.1): connectivity classification,
//! latency probing, and the rolling-failure-window scalar score that drives
//! the router.

pub mod connectivity;
pub mod estimator;
pub mod types;

pub use connectivity::{ConnectivitySource, ConstantLatencyProbe, LatencyProbe};
pub use estimator::{DefaultNetworkEstimator, NetworkEstimator};
pub use types::{NetworkStatus, NetworkType};
