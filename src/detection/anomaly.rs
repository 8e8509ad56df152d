//! Behavioral anomaly detection against per-identity baselines
//!
//! Each identity accumulates a slow-adapting profile of typical
//! locations, login hours and devices. Attempts are scored by how far
//! they deviate from that profile.

use crate::detection::geo_velocity::is_new_location;
use crate::models::{Location, LoginAttempt};
use crate::persistence::{self, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A location closer than this to any baseline entry is familiar.
pub const LOCATION_TOLERANCE_KM: f64 = 50.0;

/// The baseline absorbs new behavior at most once per 7-day period, so a
/// single anomalous session cannot permanently alter the profile.
pub const REFRESH_INTERVAL_SECONDS: i64 = 7 * 24 * 3600;

/// Bounded ring of remembered locations.
const MAX_BASELINE_LOCATIONS: usize = 10;

const UNFAMILIAR_LOCATION_SCORE: f64 = 30.0;
const UNFAMILIAR_HOUR_SCORE: f64 = 20.0;
const UNFAMILIAR_DEVICE_SCORE: f64 = 25.0;

/// Historical profile of one identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserBaseline {
    /// Ring of up to 10 locations, oldest evicted first.
    pub typical_locations: Vec<Location>,
    /// UTC hours of day at which the identity has logged in.
    pub typical_hours: Vec<u32>,
    /// Device fingerprints the identity has used.
    pub typical_devices: Vec<String>,
    pub last_updated: i64,
}

impl UserBaseline {
    /// Build the initial profile from the identity's first attempt.
    pub fn seeded_from(attempt: &LoginAttempt) -> Self {
        let mut baseline = UserBaseline {
            last_updated: attempt.timestamp,
            ..UserBaseline::default()
        };
        baseline.fold(attempt);
        baseline
    }

    /// Deviation score for an attempt against this profile, additive:
    /// +30 unfamiliar location, +20 unfamiliar hour, +25 unfamiliar
    /// device, clamped to 100.
    pub fn score(&self, attempt: &LoginAttempt) -> f64 {
        let mut score = 0.0;

        if let Some(location) = &attempt.location {
            if !self.typical_locations.is_empty()
                && is_new_location(location, &self.typical_locations, LOCATION_TOLERANCE_KM)
            {
                score += UNFAMILIAR_LOCATION_SCORE;
            }
        }

        if !self.typical_hours.contains(&attempt.hour_of_day()) {
            score += UNFAMILIAR_HOUR_SCORE;
        }

        if !self.typical_devices.contains(&attempt.device_fingerprint) {
            score += UNFAMILIAR_DEVICE_SCORE;
        }

        f64::min(score, 100.0)
    }

    /// Whether enough time has passed since the last refresh to absorb
    /// new behavior.
    pub fn is_due_for_refresh(&self, now: i64) -> bool {
        now - self.last_updated > REFRESH_INTERVAL_SECONDS
    }

    /// Fold the attempt's location, hour and device into the profile and
    /// reset the refresh clock.
    pub fn absorb(&mut self, attempt: &LoginAttempt) {
        self.fold(attempt);
        self.last_updated = attempt.timestamp;
    }

    fn fold(&mut self, attempt: &LoginAttempt) {
        if let Some(location) = &attempt.location {
            self.typical_locations.push(location.clone());
            if self.typical_locations.len() > MAX_BASELINE_LOCATIONS {
                self.typical_locations.remove(0);
            }
        }

        let hour = attempt.hour_of_day();
        if !self.typical_hours.contains(&hour) {
            self.typical_hours.push(hour);
        }

        if !self.typical_devices.contains(&attempt.device_fingerprint) {
            self.typical_devices.push(attempt.device_fingerprint.clone());
        }
    }
}

/// Scores attempts against store-backed per-identity baselines.
///
/// Baselines live under `baseline:<user-id>` so every instance of the
/// engine observes the same profile.
pub struct AnomalyDetector {
    store: Arc<dyn KeyValueStore>,
}

impl AnomalyDetector {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        AnomalyDetector { store }
    }

    fn baseline_key(user_id: &str) -> String {
        format!("baseline:{}", user_id)
    }

    /// Score the attempt for the given identity. Anonymous attempts
    /// score 0: an unknown actor cannot be baselined.
    ///
    /// A first sighting seeds the profile from the attempt and reports
    /// no signal (cold start). The profile is only seeded or refreshed
    /// from ground-truth successful attempts, so a stranger failing a
    /// password never shapes the victim's baseline.
    pub fn detect(&self, attempt: &LoginAttempt, user_id: Option<&str>) -> f64 {
        let user_id = match user_id {
            Some(id) => id,
            None => return 0.0,
        };
        let key = Self::baseline_key(user_id);

        let baseline: Option<UserBaseline> =
            match persistence::get_json(self.store.as_ref(), &key) {
                Ok(baseline) => baseline,
                Err(e) => {
                    log::warn!("Failed to read baseline {}: {}", key, e);
                    return 0.0;
                }
            };

        let ground_truth = attempt.is_resolved() && attempt.success;

        let mut baseline = match baseline {
            Some(baseline) => baseline,
            None => {
                if ground_truth {
                    let seeded = UserBaseline::seeded_from(attempt);
                    self.persist(&key, &seeded);
                }
                return 0.0;
            }
        };

        let score = baseline.score(attempt);

        if ground_truth && baseline.is_due_for_refresh(attempt.timestamp) {
            baseline.absorb(attempt);
            self.persist(&key, &baseline);
        }

        score
    }

    /// Fetch the stored profile, if any.
    pub fn baseline(&self, user_id: &str) -> Option<UserBaseline> {
        persistence::get_json(self.store.as_ref(), &Self::baseline_key(user_id))
            .unwrap_or_default()
    }

    fn persist(&self, key: &str, baseline: &UserBaseline) {
        if let Err(e) = persistence::put_json(self.store.as_ref(), key, baseline, None) {
            log::warn!("Failed to persist baseline {}: {}", key, e);
        }
    }
}
