//! Connectivity classification and the scalar status snapshot it produces.

use serde::{Deserialize, Serialize};

/// Coarse connectivity classification (spec §3/§4.1).
///
/// Mobile-subtype classification beyond 3G/4G is collapsed per the §9 open
/// question ("more accurate classification is desirable but not specified
/// here"); a `ConnectivitySource` implementation is free to report
/// `Mobile3g`/`Mobile4g` directly and this type does not attempt finer
/// generation detection (5G, etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    Wifi,
    Mobile4g,
    Mobile3g,
    Mobile2g,
    None,
    Unknown,
}

impl NetworkType {
    /// Base quality score before latency/failure adjustment (spec §4.1).
    pub fn base_score(&self) -> f64 {
        match self {
            NetworkType::Wifi => 1.0,
            NetworkType::Mobile4g => 0.8,
            NetworkType::Mobile3g => 0.5,
            NetworkType::Mobile2g => 0.3,
            NetworkType::None | NetworkType::Unknown => 0.0,
        }
    }
}

/// A point-in-time snapshot of network quality (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub network_type: NetworkType,
    pub quality_score: f64,
    pub latency_ms: u64,
}

impl NetworkStatus {
    /// `is_stable` iff `score >= 0.5` (spec §3).
    pub fn is_stable(&self) -> bool {
        self.quality_score >= 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_scores_match_spec_table() {
        assert_eq!(NetworkType::Wifi.base_score(), 1.0);
        assert_eq!(NetworkType::Mobile4g.base_score(), 0.8);
        assert_eq!(NetworkType::Mobile3g.base_score(), 0.5);
        assert_eq!(NetworkType::Mobile2g.base_score(), 0.3);
        assert_eq!(NetworkType::None.base_score(), 0.0);
        assert_eq!(NetworkType::Unknown.base_score(), 0.0);
    }

    #[test]
    fn stability_boundary_is_inclusive() {
        let stable = NetworkStatus { network_type: NetworkType::Mobile3g, quality_score: 0.5, latency_ms: 50 };
        let unstable = NetworkStatus { network_type: NetworkType::Mobile3g, quality_score: 0.499, latency_ms: 50 };
        assert!(stable.is_stable());
        assert!(!unstable.is_stable());
    }
}
