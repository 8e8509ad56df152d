//! Challenge routing and verification
//!
//! Maps a risk level to the required action and challenge kind. This is
//! a small finite decision table re-evaluated fresh on every attempt,
//! with no memory of past decisions.

pub mod turnstile;

pub use turnstile::{TurnstileVerifier, VerificationResult, DEFAULT_VERIFY_URL};

use crate::models::RiskLevel;
use serde::{Deserialize, Serialize};

/// Kind of secondary verification interposed before access is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeType {
    Turnstile,
    Managed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeDifficulty {
    Easy,
    Medium,
    Hard,
}

/// Per-level challenge parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChallengeParameters {
    pub challenge_type: ChallengeType,
    pub difficulty: ChallengeDifficulty,
    pub timeout_seconds: u64,
}

pub struct ChallengeRouter;

impl ChallengeRouter {
    /// Everything above `low` must prove itself.
    pub fn should_require_challenge(level: RiskLevel) -> bool {
        level != RiskLevel::Low
    }

    /// Interactive turnstile for the lower half of the scale, managed
    /// challenges for the upper half.
    pub fn challenge_type(level: RiskLevel) -> ChallengeType {
        match level {
            RiskLevel::Low | RiskLevel::Medium => ChallengeType::Turnstile,
            RiskLevel::High | RiskLevel::Critical => ChallengeType::Managed,
        }
    }

    pub fn parameters(level: RiskLevel) -> ChallengeParameters {
        match level {
            RiskLevel::Low => ChallengeParameters {
                challenge_type: ChallengeType::Turnstile,
                difficulty: ChallengeDifficulty::Easy,
                timeout_seconds: 300,
            },
            RiskLevel::Medium => ChallengeParameters {
                challenge_type: ChallengeType::Turnstile,
                difficulty: ChallengeDifficulty::Medium,
                timeout_seconds: 600,
            },
            RiskLevel::High => ChallengeParameters {
                challenge_type: ChallengeType::Managed,
                difficulty: ChallengeDifficulty::Medium,
                timeout_seconds: 900,
            },
            RiskLevel::Critical => ChallengeParameters {
                challenge_type: ChallengeType::Managed,
                difficulty: ChallengeDifficulty::Hard,
                timeout_seconds: 1200,
            },
        }
    }
}
