//! Device reputation tracking
//!
//! Every device fingerprint carries a bounded running reputation.
//! Reputation never resets; it only moves through accumulated opposing
//! signals, so a single failure does not erase a long history of
//! successes, while repeated challenge failures decay it faster than
//! logins can rebuild it.

use crate::persistence::{self, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Risk reported for a fingerprint that has never been seen.
pub const NEUTRAL_RISK: f64 = 50.0;

const INITIAL_REPUTATION: f64 = 50.0;
const SUCCESS_BOOST: f64 = 2.0;
const FAILURE_PENALTY: f64 = 10.0;
const CHALLENGE_PASS_BOOST: f64 = 5.0;
const CHALLENGE_FAIL_PENALTY: f64 = 15.0;

/// Running reputation record for one device fingerprint. Created at the
/// neutral score on first sighting and mutated on every attempt and
/// challenge outcome; never deleted by the engine itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReputation {
    pub fingerprint: String,
    /// 0-100, higher is better.
    pub reputation_score: f64,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub failed_attempts: u64,
    pub challenge_passes: u64,
    pub challenge_fails: u64,
    pub last_seen: i64,
}

impl DeviceReputation {
    pub fn new(fingerprint: impl Into<String>, now: i64) -> Self {
        DeviceReputation {
            fingerprint: fingerprint.into(),
            reputation_score: INITIAL_REPUTATION,
            total_attempts: 0,
            successful_attempts: 0,
            failed_attempts: 0,
            challenge_passes: 0,
            challenge_fails: 0,
            last_seen: now,
        }
    }

    /// Apply a login outcome: +2 on success, -10 on failure, clamped.
    pub fn record_login(&mut self, success: bool, now: i64) {
        self.total_attempts += 1;
        self.last_seen = now;

        if success {
            self.successful_attempts += 1;
            self.reputation_score = (self.reputation_score + SUCCESS_BOOST).min(100.0);
        } else {
            self.failed_attempts += 1;
            self.reputation_score = (self.reputation_score - FAILURE_PENALTY).max(0.0);
        }
    }

    /// Apply a challenge verdict: +5 on pass, -15 on fail, clamped.
    pub fn record_challenge(&mut self, passed: bool, now: i64) {
        self.last_seen = now;

        if passed {
            self.challenge_passes += 1;
            self.reputation_score = (self.reputation_score + CHALLENGE_PASS_BOOST).min(100.0);
        } else {
            self.challenge_fails += 1;
            self.reputation_score = (self.reputation_score - CHALLENGE_FAIL_PENALTY).max(0.0);
        }
    }

    /// Inverted reputation: 100 reputation = 0 risk.
    pub fn risk_score(&self) -> f64 {
        100.0 - self.reputation_score
    }
}

/// Store-backed reputation tracker. Records live under
/// `reputation:<fingerprint>` so every engine instance observes the same
/// history; the update logic itself is pure on [`DeviceReputation`].
pub struct DeviceReputationTracker {
    store: Arc<dyn KeyValueStore>,
}

impl DeviceReputationTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        DeviceReputationTracker { store }
    }

    fn key(fingerprint: &str) -> String {
        format!("reputation:{}", fingerprint)
    }

    /// Apply a login outcome (and optionally a challenge verdict known
    /// in the same flow) to a fingerprint, returning the updated record.
    pub fn update_reputation(
        &self,
        fingerprint: &str,
        success: bool,
        challenge_passed: Option<bool>,
        now: i64,
    ) -> DeviceReputation {
        let mut rep = self.load_or_new(fingerprint, now);
        rep.record_login(success, now);
        if let Some(passed) = challenge_passed {
            rep.record_challenge(passed, now);
        }
        self.persist(&rep);
        rep
    }

    /// Apply a stand-alone challenge verdict (no login outcome attached)
    /// to a fingerprint.
    pub fn record_challenge(&self, fingerprint: &str, passed: bool, now: i64) -> DeviceReputation {
        let mut rep = self.load_or_new(fingerprint, now);
        rep.record_challenge(passed, now);
        self.persist(&rep);
        rep
    }

    /// Risk contributed by a fingerprint: `100 - reputation`, neutral 50
    /// for unseen devices (or when the store is unavailable).
    pub fn get_risk_score(&self, fingerprint: &str) -> f64 {
        match persistence::get_json::<DeviceReputation>(
            self.store.as_ref(),
            &Self::key(fingerprint),
        ) {
            Ok(Some(rep)) => rep.risk_score(),
            Ok(None) => NEUTRAL_RISK,
            Err(e) => {
                log::warn!("Failed to read reputation for {}: {}", fingerprint, e);
                NEUTRAL_RISK
            }
        }
    }

    pub fn get_reputation(&self, fingerprint: &str) -> Option<DeviceReputation> {
        persistence::get_json(self.store.as_ref(), &Self::key(fingerprint)).unwrap_or_default()
    }

    fn load_or_new(&self, fingerprint: &str, now: i64) -> DeviceReputation {
        match persistence::get_json(self.store.as_ref(), &Self::key(fingerprint)) {
            Ok(Some(rep)) => rep,
            Ok(None) => DeviceReputation::new(fingerprint, now),
            Err(e) => {
                log::warn!("Failed to read reputation for {}: {}", fingerprint, e);
                DeviceReputation::new(fingerprint, now)
            }
        }
    }

    fn persist(&self, rep: &DeviceReputation) {
        if let Err(e) =
            persistence::put_json(self.store.as_ref(), &Self::key(&rep.fingerprint), rep, None)
        {
            log::warn!("Failed to persist reputation for {}: {}", rep.fingerprint, e);
        }
    }
}
