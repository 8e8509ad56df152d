//! Credential stuffing detection over a per-IP attempt window
//!
//! Distinguishes stuffing (many identities, one source) from brute force
//! (one identity, possibly many sources) by fanning the window out over
//! the identities a single IP has attempted.

use crate::models::{AttemptRecord, LoginAttempt};
use crate::persistence::{self, KeyValueStore};
use std::collections::HashSet;
use std::sync::Arc;

/// Attempt window length: 15 minutes.
pub const DEFAULT_WINDOW_SECONDS: i64 = 15 * 60;

/// Distinct identities from one IP before the fan-out component fires.
const DISTINCT_IDENTITY_THRESHOLD: usize = 3;

/// In-window failures before the failure component fires
/// (3 identities x 2 attempts per identity).
const FAILED_ATTEMPT_THRESHOLD: usize = 6;

/// Rapid-fire trailing window and attempt count.
const RAPID_FIRE_SECONDS: i64 = 60;
const RAPID_FIRE_THRESHOLD: usize = 10;

const TTL_SLACK_SECONDS: i64 = 60;

/// Detects one source IP spraying credentials across many identities.
pub struct CredentialStuffingDetector {
    store: Arc<dyn KeyValueStore>,
    window_seconds: i64,
}

impl CredentialStuffingDetector {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_window(store, DEFAULT_WINDOW_SECONDS)
    }

    pub fn with_window(store: Arc<dyn KeyValueStore>, window_seconds: i64) -> Self {
        CredentialStuffingDetector {
            store,
            window_seconds,
        }
    }

    fn window_key(ip: &str) -> String {
        format!("stuffing:{}", ip)
    }

    /// Score the attempt against the source IP's recent history.
    /// Additive components, clamped to 100:
    /// +50 distinct-identity fan-out, +30 failure volume, +20 rapid fire.
    pub fn detect(&self, attempt: &LoginAttempt) -> f64 {
        if attempt.username.is_none() {
            return 0.0;
        }

        let history = self.load_window(&attempt.ip_address, attempt.timestamp);

        let identities: HashSet<&str> = history
            .iter()
            .filter_map(|r| r.username.as_deref())
            .collect();
        let failed = history.iter().filter(|r| !r.success).count();
        let rapid = history
            .iter()
            .filter(|r| attempt.timestamp - r.timestamp < RAPID_FIRE_SECONDS)
            .count();

        let mut score = 0.0;
        if identities.len() >= DISTINCT_IDENTITY_THRESHOLD {
            score += 50.0;
        }
        if failed >= FAILED_ATTEMPT_THRESHOLD {
            score += 30.0;
        }
        if rapid > RAPID_FIRE_THRESHOLD {
            score += 20.0;
        }

        f64::min(score, 100.0)
    }

    /// Append the attempt to the source IP's window, pruned to the
    /// window length. Called once per logical attempt.
    pub fn record(&self, attempt: &LoginAttempt) {
        let key = Self::window_key(&attempt.ip_address);
        let mut history = self.load_window(&attempt.ip_address, attempt.timestamp);
        history.push(AttemptRecord::from(attempt));

        let ttl = self.window_seconds + TTL_SLACK_SECONDS;
        if let Err(e) = persistence::put_json(self.store.as_ref(), &key, &history, Some(ttl)) {
            log::warn!("Failed to persist stuffing window {}: {}", key, e);
        }
    }

    fn load_window(&self, ip: &str, now: i64) -> Vec<AttemptRecord> {
        let key = Self::window_key(ip);
        let history: Vec<AttemptRecord> =
            match persistence::get_json(self.store.as_ref(), &key) {
                Ok(Some(records)) => records,
                Ok(None) => Vec::new(),
                Err(e) => {
                    log::warn!("Failed to read stuffing window {}: {}", key, e);
                    Vec::new()
                }
            };

        let cutoff = now - self.window_seconds;
        history.into_iter().filter(|r| r.timestamp > cutoff).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssessmentPhase, AuthMethod};
    use crate::persistence::SqliteKeyValueStore;

    fn create_detector() -> CredentialStuffingDetector {
        let store = Arc::new(SqliteKeyValueStore::in_memory().unwrap());
        CredentialStuffingDetector::new(store)
    }

    fn attempt(username: &str, ip: &str, timestamp: i64, success: bool) -> LoginAttempt {
        LoginAttempt {
            timestamp,
            ip_address: ip.to_string(),
            success,
            username: Some(username.to_string()),
            user_id: None,
            user_agent: "test-agent".to_string(),
            location: None,
            device_fingerprint: "fp".to_string(),
            auth_method: AuthMethod::Form,
            phase: AssessmentPhase::Resolved,
        }
    }

    #[test]
    fn test_anonymous_attempt_scores_zero() {
        let detector = create_detector();
        let mut anonymous = attempt("x", "1.1.1.1", 1700000000, false);
        anonymous.username = None;
        assert_eq!(detector.detect(&anonymous), 0.0);
    }

    #[test]
    fn test_single_identity_no_fanout() {
        let detector = create_detector();

        for i in 0..4 {
            detector.record(&attempt("alice", "1.1.1.1", 1700000000 + i * 30, false));
        }

        // One identity: no fan-out, failures below threshold.
        let score = detector.detect(&attempt("alice", "1.1.1.1", 1700000200, false));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_identity_fanout_scores_50() {
        let detector = create_detector();

        detector.record(&attempt("alice", "1.1.1.1", 1700000000, false));
        detector.record(&attempt("bob", "1.1.1.1", 1700000100, false));
        detector.record(&attempt("carol", "1.1.1.1", 1700000200, false));

        let score = detector.detect(&attempt("dave", "1.1.1.1", 1700000300, false));
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_fanout_with_failure_volume_scores_80() {
        let detector = create_detector();

        // 3 identities x 2 failed attempts each within 15 minutes.
        for (i, user) in ["alice", "bob", "carol"].iter().enumerate() {
            for j in 0..2 {
                let ts = 1700000000 + (i as i64) * 120 + j * 61;
                detector.record(&attempt(user, "1.1.1.1", ts, false));
            }
        }

        let score = detector.detect(&attempt("dave", "1.1.1.1", 1700000500, false));
        assert!(score >= 80.0, "expected >= 80, got {}", score);
    }

    #[test]
    fn test_rapid_fire_adds_20() {
        let detector = create_detector();

        // 11 attempts in the trailing minute across 3 identities.
        for i in 0..11 {
            let user = ["alice", "bob", "carol"][i % 3];
            detector.record(&attempt(user, "1.1.1.1", 1700000000 + i as i64, false));
        }

        let score = detector.detect(&attempt("dave", "1.1.1.1", 1700000012, false));
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_window_pruning() {
        let detector = create_detector();

        detector.record(&attempt("alice", "1.1.1.1", 1700000000, false));
        detector.record(&attempt("bob", "1.1.1.1", 1700000001, false));
        detector.record(&attempt("carol", "1.1.1.1", 1700000002, false));

        // 20 minutes later the window is empty again.
        let score = detector.detect(&attempt("dave", "1.1.1.1", 1700000000 + 1200, false));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_ips_are_independent() {
        let detector = create_detector();

        detector.record(&attempt("alice", "1.1.1.1", 1700000000, false));
        detector.record(&attempt("bob", "1.1.1.1", 1700000001, false));
        detector.record(&attempt("carol", "1.1.1.1", 1700000002, false));

        let score = detector.detect(&attempt("dave", "2.2.2.2", 1700000003, false));
        assert_eq!(score, 0.0);
    }
}
