use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Geographic location attached to a login attempt.
///
/// Optional on an attempt: absent when neither the edge network nor the
/// local GeoIP database could resolve the client address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

/// How the credentials were presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Form,
    ApiKey,
    Session,
}

/// Which pass of the two-phase assessment this attempt represents.
///
/// `Pending` is the pre-authentication pass: `success` is a placeholder
/// and no detector state may be mutated. `Resolved` carries the ground
/// truth outcome and is the only pass that records windows, reputation
/// and baseline refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentPhase {
    Pending,
    Resolved,
}

/// The unit of work flowing through the risk pipeline.
///
/// Immutable once constructed for a given request, except `success` and
/// `user_id` which are back-filled via [`LoginAttempt::resolve`] after
/// credential verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    pub ip_address: String,
    pub success: bool,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub user_agent: String,
    pub location: Option<Location>,
    pub device_fingerprint: String,
    pub auth_method: AuthMethod,
    pub phase: AssessmentPhase,
}

impl LoginAttempt {
    /// Build the pre-authentication attempt for an incoming request.
    pub fn pending(
        timestamp: i64,
        ip_address: impl Into<String>,
        username: Option<String>,
        user_agent: impl Into<String>,
        location: Option<Location>,
        auth_method: AuthMethod,
    ) -> Self {
        let ip_address = ip_address.into();
        let user_agent = user_agent.into();
        let device_fingerprint = device_fingerprint(&user_agent, &ip_address);
        LoginAttempt {
            timestamp,
            ip_address,
            success: false,
            username,
            user_id: None,
            user_agent,
            location,
            device_fingerprint,
            auth_method,
            phase: AssessmentPhase::Pending,
        }
    }

    /// Back-fill the credential verification outcome, producing the
    /// `Resolved` attempt for the second assessment pass.
    pub fn resolve(mut self, success: bool, user_id: Option<String>) -> Self {
        self.success = success;
        if user_id.is_some() {
            self.user_id = user_id;
        }
        self.phase = AssessmentPhase::Resolved;
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.phase == AssessmentPhase::Resolved
    }

    /// UTC hour-of-day (0-23) of the attempt.
    pub fn hour_of_day(&self) -> u32 {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
            .map(|dt| dt.hour())
            .unwrap_or(0)
    }
}

/// Compact window entry stored for brute-force / credential-stuffing
/// detection. Windows never need the full attempt, only outcome,
/// identity and position in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub timestamp: i64,
    pub username: Option<String>,
    pub success: bool,
}

impl From<&LoginAttempt> for AttemptRecord {
    fn from(attempt: &LoginAttempt) -> Self {
        AttemptRecord {
            timestamp: attempt.timestamp,
            username: attempt.username.clone(),
            success: attempt.success,
        }
    }
}

/// Derive the device fingerprint from user agent and client IP.
pub fn device_fingerprint(user_agent: &str, ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hasher.update(b":");
    hasher.update(ip.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_attempt() -> LoginAttempt {
        LoginAttempt::pending(
            1700000000,
            "203.0.113.9",
            Some("alice@example.com".to_string()),
            "Mozilla/5.0",
            None,
            AuthMethod::Form,
        )
    }

    #[test]
    fn test_pending_defaults() {
        let attempt = sample_attempt();
        assert!(!attempt.success);
        assert!(attempt.user_id.is_none());
        assert_eq!(attempt.phase, AssessmentPhase::Pending);
        assert_eq!(attempt.device_fingerprint.len(), 64);
    }

    #[test]
    fn test_resolve_backfills_outcome() {
        let attempt = sample_attempt().resolve(true, Some("user-1".to_string()));
        assert!(attempt.success);
        assert_eq!(attempt.user_id.as_deref(), Some("user-1"));
        assert!(attempt.is_resolved());
    }

    #[test]
    fn test_resolve_keeps_existing_user_id() {
        let mut attempt = sample_attempt();
        attempt.user_id = Some("user-1".to_string());
        let attempt = attempt.resolve(false, None);
        assert_eq!(attempt.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = device_fingerprint("Mozilla/5.0", "203.0.113.9");
        let b = device_fingerprint("Mozilla/5.0", "203.0.113.9");
        let c = device_fingerprint("Mozilla/5.0", "203.0.113.10");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hour_of_day() {
        // 1700000000 = 2023-11-14 22:13:20 UTC
        let attempt = sample_attempt();
        assert_eq!(attempt.hour_of_day(), 22);
    }
}
