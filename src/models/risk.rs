use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered risk classification derived solely from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Per-attempt assessment result: the five detector sub-scores, the
/// weighted composite and its level. Produced fresh for every attempt
/// and never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactors {
    pub brute_force: f64,
    pub credential_stuffing: f64,
    pub geo_velocity: f64,
    pub anomaly: f64,
    pub device_reputation: f64,
    pub composite: f64,
    pub level: RiskLevel,
}
