//! Rolling aggregation of decisions into queryable daily metrics
//!
//! One `metrics:<YYYY-MM-DD>` bucket per UTC day, updated through the
//! shared read-modify-write primitive and expiring after 30 days.

use crate::models::{DailyMetrics, LoginAttempt, RiskLevel};
use crate::persistence::{self, KeyValueStore, PersistenceError};
use chrono::{DateTime, Timelike, Utc};
use std::sync::Arc;

/// Daily buckets live for 30 days.
pub const METRICS_TTL_SECONDS: i64 = 30 * 24 * 3600;

/// Attempts scoring above this contribute to the per-IP risk rollup.
const RISKY_IP_THRESHOLD: f64 = 30.0;

pub struct AnalyticsCollector {
    store: Arc<dyn KeyValueStore>,
}

impl AnalyticsCollector {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        AnalyticsCollector { store }
    }

    fn metrics_key(date: &str) -> String {
        format!("metrics:{}", date)
    }

    /// UTC calendar date of a unix timestamp, `YYYY-MM-DD`.
    pub fn date_of(timestamp: i64) -> String {
        DateTime::<Utc>::from_timestamp(timestamp, 0)
            .unwrap_or_default()
            .format("%Y-%m-%d")
            .to_string()
    }

    fn hour_of(timestamp: i64) -> u32 {
        DateTime::<Utc>::from_timestamp(timestamp, 0)
            .map(|dt| dt.hour())
            .unwrap_or(0)
    }

    /// Record one assessed attempt into its day bucket.
    pub fn record_attempt(&self, attempt: &LoginAttempt, risk_score: f64, risk_level: RiskLevel) {
        let ip = attempt.ip_address.clone();
        let success = attempt.success;
        let hour = Self::hour_of(attempt.timestamp);

        self.update(attempt.timestamp, move |mut m: DailyMetrics| {
            m.total_attempts += 1;
            if success {
                m.successful_logins += 1;
            } else {
                m.failed_logins += 1;
            }

            m.risk_score_distribution.increment(risk_level);
            m.hourly_attempts.entry(hour).or_default().attempts += 1;

            if risk_score > RISKY_IP_THRESHOLD {
                let entry = m.top_risk_ips.entry(ip).or_default();
                entry.score += risk_score;
                entry.attempts += 1;
            }

            m
        });
    }

    pub fn record_challenge_issued(&self, timestamp: i64) {
        self.update(timestamp, |mut m: DailyMetrics| {
            m.challenges_issued += 1;
            m
        });
    }

    pub fn record_challenge_completed(&self, success: bool, timestamp: i64) {
        self.update(timestamp, move |mut m: DailyMetrics| {
            if success {
                m.challenge_completions += 1;
            }
            m
        });
    }

    /// Record a policy block, tagged by reason, into the daily counters
    /// and the hour histogram.
    pub fn record_blocked_attempt(&self, reason: &str, timestamp: i64) {
        let reason = reason.to_string();
        let hour = Self::hour_of(timestamp);

        self.update(timestamp, move |mut m: DailyMetrics| {
            m.blocked_attempts += 1;
            *m.attack_types.entry(reason).or_insert(0) += 1;
            m.hourly_attempts.entry(hour).or_default().blocked += 1;
            m
        });
    }

    /// Fetch the bucket for a date, `None` when no decisions landed that
    /// day (or the bucket has expired).
    pub fn get_metrics(&self, date: &str) -> Result<Option<DailyMetrics>, PersistenceError> {
        persistence::get_json(self.store.as_ref(), &Self::metrics_key(date))
    }

    /// A transient store outage loses one aggregation update, never an
    /// assessment.
    fn update<F>(&self, timestamp: i64, f: F)
    where
        F: FnOnce(DailyMetrics) -> DailyMetrics,
    {
        let key = Self::metrics_key(&Self::date_of(timestamp));
        if let Err(e) =
            persistence::update_json(self.store.as_ref(), &key, Some(METRICS_TTL_SECONDS), f)
        {
            log::warn!("Failed to update metrics bucket {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssessmentPhase, AuthMethod};
    use crate::persistence::SqliteKeyValueStore;

    fn create_collector() -> AnalyticsCollector {
        let store = Arc::new(SqliteKeyValueStore::in_memory().unwrap());
        AnalyticsCollector::new(store)
    }

    fn attempt(ip: &str, timestamp: i64, success: bool) -> LoginAttempt {
        LoginAttempt {
            timestamp,
            ip_address: ip.to_string(),
            success,
            username: Some("alice".to_string()),
            user_id: None,
            user_agent: "test-agent".to_string(),
            location: None,
            device_fingerprint: "fp".to_string(),
            auth_method: AuthMethod::Form,
            phase: AssessmentPhase::Resolved,
        }
    }

    // 1700000000 = 2023-11-14 22:13:20 UTC
    const TS: i64 = 1700000000;

    #[test]
    fn test_date_bucketing() {
        assert_eq!(AnalyticsCollector::date_of(TS), "2023-11-14");
        assert_eq!(AnalyticsCollector::date_of(TS + 24 * 3600), "2023-11-15");
    }

    #[test]
    fn test_record_attempt_counters() {
        let collector = create_collector();

        collector.record_attempt(&attempt("1.1.1.1", TS, true), 5.0, RiskLevel::Low);
        collector.record_attempt(&attempt("1.1.1.1", TS + 10, false), 45.0, RiskLevel::Medium);

        let m = collector.get_metrics("2023-11-14").unwrap().unwrap();
        assert_eq!(m.total_attempts, 2);
        assert_eq!(m.successful_logins, 1);
        assert_eq!(m.failed_logins, 1);
        assert_eq!(m.risk_score_distribution.low, 1);
        assert_eq!(m.risk_score_distribution.medium, 1);
        assert_eq!(m.hourly_attempts.get(&22).unwrap().attempts, 2);
    }

    #[test]
    fn test_risky_ip_rollup_thresholded() {
        let collector = create_collector();

        collector.record_attempt(&attempt("1.1.1.1", TS, false), 25.0, RiskLevel::Low);
        collector.record_attempt(&attempt("2.2.2.2", TS, false), 62.0, RiskLevel::High);
        collector.record_attempt(&attempt("2.2.2.2", TS + 5, false), 70.0, RiskLevel::High);

        let m = collector.get_metrics("2023-11-14").unwrap().unwrap();
        assert!(!m.top_risk_ips.contains_key("1.1.1.1"));

        let entry = m.top_risk_ips.get("2.2.2.2").unwrap();
        assert_eq!(entry.attempts, 2);
        assert!((entry.score - 132.0).abs() < 1e-9);
    }

    #[test]
    fn test_challenge_counters() {
        let collector = create_collector();

        collector.record_challenge_issued(TS);
        collector.record_challenge_issued(TS + 1);
        collector.record_challenge_completed(true, TS + 2);
        collector.record_challenge_completed(false, TS + 3);

        let m = collector.get_metrics("2023-11-14").unwrap().unwrap();
        assert_eq!(m.challenges_issued, 2);
        // Failed completions are not counted as completions.
        assert_eq!(m.challenge_completions, 1);
    }

    #[test]
    fn test_blocked_attempt_tagged_and_hour_bucketed() {
        let collector = create_collector();

        collector.record_blocked_attempt("critical-risk", TS);
        collector.record_blocked_attempt("critical-risk", TS + 5);

        let m = collector.get_metrics("2023-11-14").unwrap().unwrap();
        assert_eq!(m.blocked_attempts, 2);
        assert_eq!(*m.attack_types.get("critical-risk").unwrap(), 2);
        assert_eq!(m.hourly_attempts.get(&22).unwrap().blocked, 2);
    }

    #[test]
    fn test_days_are_independent() {
        let collector = create_collector();

        collector.record_attempt(&attempt("1.1.1.1", TS, true), 0.0, RiskLevel::Low);
        collector.record_attempt(&attempt("1.1.1.1", TS + 24 * 3600, true), 0.0, RiskLevel::Low);

        let day1 = collector.get_metrics("2023-11-14").unwrap().unwrap();
        let day2 = collector.get_metrics("2023-11-15").unwrap().unwrap();
        assert_eq!(day1.total_attempts, 1);
        assert_eq!(day2.total_attempts, 1);
    }

    #[test]
    fn test_missing_day_reads_none() {
        let collector = create_collector();
        assert!(collector.get_metrics("1999-01-01").unwrap().is_none());
    }
}
