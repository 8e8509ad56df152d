//! Weighted composite scoring and level classification
//!
//! A fixed, explainable weighted combination of the detector sub-scores.
//! Pure: identical inputs and weights always produce identical output.

use crate::models::{RiskFactors, RiskLevel};
use serde::{Deserialize, Serialize};

/// Relative weight of each detector in the composite. Weights are
/// expected to sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub brute_force: f64,
    pub credential_stuffing: f64,
    pub geo_velocity: f64,
    pub anomaly: f64,
    pub device_reputation: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        RiskWeights {
            brute_force: 0.30,
            credential_stuffing: 0.25,
            geo_velocity: 0.20,
            anomaly: 0.15,
            device_reputation: 0.10,
        }
    }
}

/// Partial weight override: only the fields present replace the current
/// weights.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RiskWeightsUpdate {
    pub brute_force: Option<f64>,
    pub credential_stuffing: Option<f64>,
    pub geo_velocity: Option<f64>,
    pub anomaly: Option<f64>,
    pub device_reputation: Option<f64>,
}

/// The five detector sub-scores feeding one composite, each in [0,100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubScores {
    pub brute_force: f64,
    pub credential_stuffing: f64,
    pub geo_velocity: f64,
    pub anomaly: f64,
    pub device_reputation: f64,
}

pub struct RiskCalculator {
    weights: RiskWeights,
}

impl RiskCalculator {
    pub fn new() -> Self {
        Self::with_weights(RiskWeights::default())
    }

    pub fn with_weights(weights: RiskWeights) -> Self {
        RiskCalculator { weights }
    }

    /// Combine the sub-scores into a clamped composite and its level.
    pub fn calculate(&self, scores: SubScores) -> RiskFactors {
        let composite = scores.brute_force * self.weights.brute_force
            + scores.credential_stuffing * self.weights.credential_stuffing
            + scores.geo_velocity * self.weights.geo_velocity
            + scores.anomaly * self.weights.anomaly
            + scores.device_reputation * self.weights.device_reputation;
        let composite = composite.clamp(0.0, 100.0);

        RiskFactors {
            brute_force: scores.brute_force,
            credential_stuffing: scores.credential_stuffing,
            geo_velocity: scores.geo_velocity,
            anomaly: scores.anomaly,
            device_reputation: scores.device_reputation,
            composite,
            level: Self::risk_level(composite),
        }
    }

    /// Total, non-overlapping partition of the composite range.
    pub fn risk_level(composite: f64) -> RiskLevel {
        if composite < 30.0 {
            RiskLevel::Low
        } else if composite < 60.0 {
            RiskLevel::Medium
        } else if composite < 85.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    /// Merge a partial override into the current weights.
    pub fn update_weights(&mut self, update: RiskWeightsUpdate) {
        if let Some(w) = update.brute_force {
            self.weights.brute_force = w;
        }
        if let Some(w) = update.credential_stuffing {
            self.weights.credential_stuffing = w;
        }
        if let Some(w) = update.geo_velocity {
            self.weights.geo_velocity = w;
        }
        if let Some(w) = update.anomaly {
            self.weights.anomaly = w;
        }
        if let Some(w) = update.device_reputation {
            self.weights.device_reputation = w;
        }
    }

    pub fn weights(&self) -> RiskWeights {
        self.weights
    }
}

impl Default for RiskCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(score: f64) -> SubScores {
        SubScores {
            brute_force: score,
            credential_stuffing: score,
            geo_velocity: score,
            anomaly: score,
            device_reputation: score,
        }
    }

    #[test]
    fn test_composite_stays_in_range() {
        let calculator = RiskCalculator::new();

        assert_eq!(calculator.calculate(uniform(0.0)).composite, 0.0);
        assert_eq!(calculator.calculate(uniform(100.0)).composite, 100.0);

        let factors = calculator.calculate(SubScores {
            brute_force: 100.0,
            credential_stuffing: 0.0,
            geo_velocity: 40.0,
            anomaly: 75.0,
            device_reputation: 50.0,
        });
        assert!(factors.composite >= 0.0 && factors.composite <= 100.0);
        // 30 + 0 + 8 + 11.25 + 5
        assert!((factors.composite - 54.25).abs() < 1e-9);
        assert_eq!(factors.level, RiskLevel::Medium);
    }

    #[test]
    fn test_level_partition_boundaries() {
        assert_eq!(RiskCalculator::risk_level(0.0), RiskLevel::Low);
        assert_eq!(RiskCalculator::risk_level(29.9), RiskLevel::Low);
        assert_eq!(RiskCalculator::risk_level(30.0), RiskLevel::Medium);
        assert_eq!(RiskCalculator::risk_level(59.9), RiskLevel::Medium);
        assert_eq!(RiskCalculator::risk_level(60.0), RiskLevel::High);
        assert_eq!(RiskCalculator::risk_level(84.9), RiskLevel::High);
        assert_eq!(RiskCalculator::risk_level(85.0), RiskLevel::Critical);
        assert_eq!(RiskCalculator::risk_level(100.0), RiskLevel::Critical);
    }

    #[test]
    fn test_calculate_is_idempotent() {
        let calculator = RiskCalculator::new();
        let scores = SubScores {
            brute_force: 60.0,
            credential_stuffing: 20.0,
            geo_velocity: 80.0,
            anomaly: 45.0,
            device_reputation: 50.0,
        };

        let first = calculator.calculate(scores);
        let second = calculator.calculate(scores);
        assert_eq!(first, second);
    }

    #[test]
    fn test_partial_weight_override() {
        let mut calculator = RiskCalculator::new();
        calculator.update_weights(RiskWeightsUpdate {
            brute_force: Some(0.5),
            geo_velocity: Some(0.0),
            ..RiskWeightsUpdate::default()
        });

        let weights = calculator.weights();
        assert_eq!(weights.brute_force, 0.5);
        assert_eq!(weights.geo_velocity, 0.0);
        // Untouched fields keep their defaults.
        assert_eq!(weights.credential_stuffing, 0.25);
        assert_eq!(weights.anomaly, 0.15);
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = RiskWeights::default();
        let sum = w.brute_force + w.credential_stuffing + w.geo_velocity + w.anomaly
            + w.device_reputation;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sub_scores_echoed_in_factors() {
        let calculator = RiskCalculator::new();
        let factors = calculator.calculate(SubScores {
            brute_force: 20.0,
            credential_stuffing: 0.0,
            geo_velocity: 100.0,
            anomaly: 50.0,
            device_reputation: 48.0,
        });
        assert_eq!(factors.brute_force, 20.0);
        assert_eq!(factors.geo_velocity, 100.0);
        assert_eq!(factors.device_reputation, 48.0);
    }
}
