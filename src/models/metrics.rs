use super::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Four-bucket histogram of assessed risk levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLevelCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl RiskLevelCounts {
    pub fn increment(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
            RiskLevel::Critical => self.critical += 1,
        }
    }
}

/// Cumulative risk contributed by a single source IP.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpRiskEntry {
    pub score: f64,
    pub attempts: u64,
}

/// Attempts seen during one UTC hour of the day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub attempts: u64,
    pub blocked: u64,
}

/// Daily rolling aggregation of decisions, keyed by UTC date
/// (`metrics:<YYYY-MM-DD>`). Entries expire after 30 days.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyMetrics {
    pub total_attempts: u64,
    pub successful_logins: u64,
    pub failed_logins: u64,
    pub blocked_attempts: u64,
    pub challenges_issued: u64,
    pub challenge_completions: u64,
    pub risk_score_distribution: RiskLevelCounts,
    pub attack_types: BTreeMap<String, u64>,
    #[serde(rename = "topRiskIPs")]
    pub top_risk_ips: BTreeMap<String, IpRiskEntry>,
    pub hourly_attempts: BTreeMap<u32, HourlyBucket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_all_zero() {
        let metrics = DailyMetrics::default();
        assert_eq!(metrics.total_attempts, 0);
        assert_eq!(metrics.risk_score_distribution.low, 0);
        assert!(metrics.attack_types.is_empty());
        assert!(metrics.hourly_attempts.is_empty());
    }

    #[test]
    fn test_histogram_increment() {
        let mut counts = RiskLevelCounts::default();
        counts.increment(RiskLevel::High);
        counts.increment(RiskLevel::High);
        counts.increment(RiskLevel::Low);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.low, 1);
        assert_eq!(counts.critical, 0);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let metrics = DailyMetrics::default();
        let json = serde_json::to_value(&metrics).unwrap();
        assert!(json.get("totalAttempts").is_some());
        assert!(json.get("riskScoreDistribution").is_some());
        assert!(json.get("topRiskIPs").is_some());
        assert!(json.get("hourlyAttempts").is_some());
    }

    #[test]
    fn test_partial_json_deserializes_with_defaults() {
        let metrics: DailyMetrics = serde_json::from_str(r#"{"totalAttempts": 3}"#).unwrap();
        assert_eq!(metrics.total_attempts, 3);
        assert_eq!(metrics.failed_logins, 0);
    }
}
