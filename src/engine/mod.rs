//! Per-attempt risk assessment pipeline
//!
//! The engine fans one `LoginAttempt` out to the five detectors, feeds
//! their sub-scores to the calculator and forwards the result to
//! analytics. Assessment is two-phase: the `Pending` pass is read-only
//! and drives the challenge decision before credentials are revealed;
//! the `Resolved` pass carries ground truth and is the only one that
//! mutates windows, reputation, baselines and metrics, exactly once
//! per logical login attempt.

use crate::analytics::AnalyticsCollector;
use crate::detection::{
    calculate_geo_velocity_score, geo_velocity::DEFAULT_GAP_HOURS, AnomalyDetector,
    BruteForceDetector, CredentialStuffingDetector,
};
use crate::models::{Location, LoginAttempt, RiskFactors};
use crate::persistence::KeyValueStore;
use crate::scoring::{DeviceReputationTracker, RiskCalculator, SubScores};
use std::sync::Arc;

/// Reference point for geo-velocity: when and where the identity last
/// logged in, as far as the caller knows.
#[derive(Debug, Clone)]
pub struct LastKnownLogin {
    pub timestamp: i64,
    pub location: Option<Location>,
}

pub struct RiskEngine {
    brute_force: BruteForceDetector,
    credential_stuffing: CredentialStuffingDetector,
    anomaly: AnomalyDetector,
    device_reputation: DeviceReputationTracker,
    calculator: RiskCalculator,
    analytics: AnalyticsCollector,
}

impl RiskEngine {
    pub fn new(store: Arc<dyn KeyValueStore>, calculator: RiskCalculator) -> Self {
        RiskEngine {
            brute_force: BruteForceDetector::new(store.clone()),
            credential_stuffing: CredentialStuffingDetector::new(store.clone()),
            anomaly: AnomalyDetector::new(store.clone()),
            device_reputation: DeviceReputationTracker::new(store.clone()),
            calculator,
            analytics: AnalyticsCollector::new(store),
        }
    }

    /// Build with explicit window lengths for the two windowed
    /// detectors.
    pub fn with_windows(
        store: Arc<dyn KeyValueStore>,
        calculator: RiskCalculator,
        brute_force_window_seconds: i64,
        stuffing_window_seconds: i64,
    ) -> Self {
        RiskEngine {
            brute_force: BruteForceDetector::with_window(
                store.clone(),
                brute_force_window_seconds,
            ),
            credential_stuffing: CredentialStuffingDetector::with_window(
                store.clone(),
                stuffing_window_seconds,
            ),
            anomaly: AnomalyDetector::new(store.clone()),
            device_reputation: DeviceReputationTracker::new(store.clone()),
            calculator,
            analytics: AnalyticsCollector::new(store),
        }
    }

    /// Assess one attempt. The detectors are independent given the same
    /// attempt and run in sequence; elapsed hours for geo-velocity are
    /// derived from the last known login, defaulting to a full day when
    /// none is known.
    pub fn assess_risk(
        &self,
        attempt: &LoginAttempt,
        user_id: Option<&str>,
        last_known: Option<&LastKnownLogin>,
    ) -> RiskFactors {
        let brute_force = self.brute_force.detect(attempt);
        let credential_stuffing = self.credential_stuffing.detect(attempt);

        let hours_elapsed = last_known
            .map(|last| (attempt.timestamp - last.timestamp) as f64 / 3600.0)
            .unwrap_or(DEFAULT_GAP_HOURS);
        let geo_velocity = calculate_geo_velocity_score(
            attempt.location.as_ref(),
            last_known.and_then(|last| last.location.as_ref()),
            hours_elapsed,
        );

        let anomaly = self.anomaly.detect(attempt, user_id);

        // On the ground-truth pass the outcome lands in the reputation
        // record before the risk read, so the current attempt is part of
        // its own device signal.
        let device_reputation = if attempt.is_resolved() {
            self.device_reputation
                .update_reputation(
                    &attempt.device_fingerprint,
                    attempt.success,
                    None,
                    attempt.timestamp,
                )
                .risk_score()
        } else {
            self.device_reputation
                .get_risk_score(&attempt.device_fingerprint)
        };

        let factors = self.calculator.calculate(SubScores {
            brute_force,
            credential_stuffing,
            geo_velocity,
            anomaly,
            device_reputation,
        });

        if attempt.is_resolved() {
            self.brute_force.record(attempt);
            self.credential_stuffing.record(attempt);
            self.analytics
                .record_attempt(attempt, factors.composite, factors.level);
        }

        log::debug!(
            "Assessed {} attempt from {}: composite {:.1} ({})",
            if attempt.is_resolved() { "resolved" } else { "pending" },
            attempt.ip_address,
            factors.composite,
            factors.level
        );

        factors
    }

    pub fn record_challenge_issued(&self, timestamp: i64) {
        self.analytics.record_challenge_issued(timestamp);
    }

    /// Record a verified challenge verdict: analytics plus the device's
    /// challenge reputation deltas.
    pub fn record_challenge_outcome(&self, fingerprint: &str, passed: bool, timestamp: i64) {
        self.device_reputation
            .record_challenge(fingerprint, passed, timestamp);
        self.analytics.record_challenge_completed(passed, timestamp);
    }

    pub fn record_blocked(&self, reason: &str, timestamp: i64) {
        self.analytics.record_blocked_attempt(reason, timestamp);
    }

    pub fn analytics(&self) -> &AnalyticsCollector {
        &self.analytics
    }
}
