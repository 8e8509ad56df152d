//! Brute force detection over a sliding failure window
//!
//! Tracks recent login attempts per identity (or per source IP when the
//! identity is unknown) and scores the attempt by the number of failures
//! inside the window.

use crate::models::{AttemptRecord, LoginAttempt};
use crate::persistence::{self, KeyValueStore, PersistenceError};
use std::sync::Arc;

/// Attempt window length: 5 minutes.
pub const DEFAULT_WINDOW_SECONDS: i64 = 5 * 60;

/// Risk contributed by each in-window failure.
const FAILURE_WEIGHT: f64 = 20.0;

/// Stored entries outlive the window they describe by this much.
pub(crate) const TTL_SLACK_SECONDS: i64 = 60;

/// Detects repeated failures against a single identity or from a single
/// source IP.
///
/// Keying prefers the identity when present, else the IP: an attacker
/// who varies the username is tracked per-IP, while a distributed
/// attacker targeting one account is tracked per-account.
pub struct BruteForceDetector {
    store: Arc<dyn KeyValueStore>,
    window_seconds: i64,
}

impl BruteForceDetector {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_window(store, DEFAULT_WINDOW_SECONDS)
    }

    pub fn with_window(store: Arc<dyn KeyValueStore>, window_seconds: i64) -> Self {
        BruteForceDetector {
            store,
            window_seconds,
        }
    }

    fn window_key(attempt: &LoginAttempt) -> String {
        match &attempt.username {
            Some(username) => format!("bruteforce:{}", username),
            None => format!("bruteforce:ip:{}", attempt.ip_address),
        }
    }

    /// Score the attempt against recent in-window failures. Read-only:
    /// recording is a separate step so one logical login attempt lands
    /// in the window exactly once.
    pub fn detect(&self, attempt: &LoginAttempt) -> f64 {
        let key = Self::window_key(attempt);
        let window = self.load_window(&key, attempt.timestamp);
        let failures = window.iter().filter(|r| !r.success).count();
        (failures as f64 * FAILURE_WEIGHT).min(100.0)
    }

    /// Append the attempt to its window, pruning entries older than the
    /// window before writing back. Called once per logical attempt, with
    /// the final outcome.
    pub fn record(&self, attempt: &LoginAttempt) {
        let key = Self::window_key(attempt);
        let mut window = self.load_window(&key, attempt.timestamp);
        window.push(AttemptRecord::from(attempt));

        let ttl = self.window_seconds + TTL_SLACK_SECONDS;
        if let Err(e) = persistence::put_json(self.store.as_ref(), &key, &window, Some(ttl)) {
            log::warn!("Failed to persist brute force window {}: {}", key, e);
        }
    }

    /// Clear the window for a key suffix (an identity, or `ip:<addr>`).
    /// Used after a confirmed non-malicious resolution.
    pub fn reset(&self, key: &str) -> Result<(), PersistenceError> {
        self.store.delete(&format!("bruteforce:{}", key))
    }

    fn load_window(&self, key: &str, now: i64) -> Vec<AttemptRecord> {
        let window: Vec<AttemptRecord> =
            match persistence::get_json(self.store.as_ref(), key) {
                Ok(Some(records)) => records,
                Ok(None) => Vec::new(),
                Err(e) => {
                    log::warn!("Failed to read brute force window {}: {}", key, e);
                    Vec::new()
                }
            };

        let cutoff = now - self.window_seconds;
        window.into_iter().filter(|r| r.timestamp > cutoff).collect()
    }
}
