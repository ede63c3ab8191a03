//! Routing strategies (spec §4.5). Each strategy resolves to the same
//! [`StrategyParams`] shape the Router's decision algorithm consults, so the
//! algorithm itself never branches on which named strategy is active.

use std::time::Duration;

use crate::core::request::Priority;

/// The resolved parameters the Router's decision algorithm actually reads
/// (spec §4.5 strategy table).
#[derive(Debug, Clone)]
pub struct StrategyParams {
    /// Score above which a full-timeout HTTP attempt is made.
    pub http_threshold: f64,
    pub http_timeout: Duration,
    /// BALANCED's secondary "short timeout" band (`> 0.3`); `None` for the
    /// other named strategies, which have a single threshold.
    pub short_http_threshold: Option<f64>,
    pub short_http_timeout: Option<Duration>,
    pub sms_escalation_delay: Duration,
    /// Priorities that trigger immediate SMS when `score == 0`.
    pub immediate_sms_priorities: Vec<Priority>,
    /// Priorities that arm an escalation timer instead of a bare enqueue,
    /// both on `score == 0` (when not in `immediate_sms_priorities`) and
    /// after a failed HTTP attempt.
    pub escalation_sms_priorities: Vec<Priority>,
}

impl StrategyParams {
    pub fn eligible_for_immediate_sms(&self, priority: Priority) -> bool {
        self.immediate_sms_priorities.contains(&priority)
    }

    pub fn eligible_for_escalation(&self, priority: Priority) -> bool {
        self.escalation_sms_priorities.contains(&priority)
    }
}

/// Named routing strategies (spec §4.5). `Custom` carries caller-supplied
/// [`StrategyParams`] directly (spec: "CUSTOM | user-set threshold & delay").
#[derive(Debug, Clone)]
pub enum Strategy {
    Aggressive,
    Balanced,
    Conservative,
    Custom(StrategyParams),
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Balanced
    }
}

impl Strategy {
    pub fn params(&self) -> StrategyParams {
        match self {
            Strategy::Aggressive => StrategyParams {
                http_threshold: 0.3,
                http_timeout: Duration::from_secs(10),
                short_http_threshold: None,
                short_http_timeout: None,
                sms_escalation_delay: Duration::from_secs(60),
                immediate_sms_priorities: vec![],
                escalation_sms_priorities: vec![Priority::High, Priority::Critical],
            },
            Strategy::Balanced => StrategyParams {
                http_threshold: 0.7,
                http_timeout: Duration::from_secs(30),
                short_http_threshold: Some(0.3),
                short_http_timeout: Some(Duration::from_secs(5)),
                sms_escalation_delay: Duration::from_secs(5 * 60),
                immediate_sms_priorities: vec![Priority::Critical],
                escalation_sms_priorities: vec![Priority::High],
            },
            Strategy::Conservative => StrategyParams {
                http_threshold: 0.5,
                http_timeout: Duration::from_secs(30),
                short_http_threshold: None,
                short_http_timeout: None,
                sms_escalation_delay: Duration::from_secs(15 * 60),
                immediate_sms_priorities: vec![],
                escalation_sms_priorities: vec![Priority::Critical],
            },
            Strategy::Custom(params) => params.clone(),
        }
    }
}
