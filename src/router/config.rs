//! Middleware-wide configuration (spec §6 `configure()`), built the way the
//! teacher builds its framework config: a plain data struct plus a fluent
//! `*Builder`.

use std::sync::Arc;

use crate::router::strategy::Strategy;
use crate::sms::escalation::{CostProvider, CostWarningCallback};

/// Snapshot of everything `configure()` can change at runtime (spec §6).
#[derive(Clone)]
pub struct MiddlewareConfig {
    pub strategy: Strategy,
    /// Spec §7 `QUEUE_FULL`: max non-terminal rows the store may hold.
    pub max_queue_size: usize,
    /// SMS gateway address used by the immediate path and escalation timers.
    pub sms_gateway: String,
    /// Master SMS on/off switch (spec §6 "enablement flags").
    pub sms_enabled: bool,
    /// Spec §6 `configure(sms_cost_provider?)`.
    pub sms_cost_provider: Option<Arc<dyn CostProvider>>,
    /// Spec §6 `configure(sms_cost_warning_callback?)`.
    pub sms_cost_warning: Option<Arc<dyn CostWarningCallback>>,
}

impl std::fmt::Debug for MiddlewareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareConfig")
            .field("strategy", &self.strategy)
            .field("max_queue_size", &self.max_queue_size)
            .field("sms_gateway", &self.sms_gateway)
            .field("sms_enabled", &self.sms_enabled)
            .field("sms_cost_provider", &self.sms_cost_provider.is_some())
            .field("sms_cost_warning", &self.sms_cost_warning.is_some())
            .finish()
    }
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_queue_size: 1000,
            sms_gateway: String::new(),
            sms_enabled: true,
            sms_cost_provider: None,
            sms_cost_warning: None,
        }
    }
}

impl MiddlewareConfig {
    pub fn builder() -> MiddlewareConfigBuilder {
        MiddlewareConfigBuilder::default()
    }
}

/// Fluent builder for [`MiddlewareConfig`], mirroring the teacher's
/// `OSLFrameworkBuilder` `with_*` convention.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareConfigBuilder {
    config: MiddlewareConfig,
}

impl MiddlewareConfigBuilder {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.config.max_queue_size = max_queue_size;
        self
    }

    pub fn with_sms_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.config.sms_gateway = gateway.into();
        self
    }

    pub fn with_sms_enabled(mut self, enabled: bool) -> Self {
        self.config.sms_enabled = enabled;
        self
    }

    pub fn with_sms_cost_provider(mut self, provider: Arc<dyn CostProvider>) -> Self {
        self.config.sms_cost_provider = Some(provider);
        self
    }

    pub fn with_sms_cost_warning(mut self, callback: Arc<dyn CostWarningCallback>) -> Self {
        self.config.sms_cost_warning = Some(callback);
        self
    }

    pub fn build(self) -> MiddlewareConfig {
        self.config
    }
}
