mod attempt;
mod metrics;
mod risk;
mod user;

pub use attempt::{
    device_fingerprint, AssessmentPhase, AttemptRecord, AuthMethod, Location, LoginAttempt,
};
pub use metrics::{DailyMetrics, HourlyBucket, IpRiskEntry, RiskLevelCounts};
pub use risk::{RiskFactors, RiskLevel};
pub use user::{Session, UserRecord};
