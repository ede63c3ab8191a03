//! Decision engine: routing strategies, middleware configuration, and the
//! Router itself (spec §4.5, §6).

pub mod config;
pub mod engine;
pub mod strategy;

pub use config::{MiddlewareConfig, MiddlewareConfigBuilder};
pub use engine::Router;
pub use strategy::{Strategy, StrategyParams};
