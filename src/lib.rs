pub mod analytics;
pub mod api;
pub mod challenge;
pub mod config;
pub mod detection;
pub mod engine;
pub mod geolocation;
pub mod models;
pub mod persistence;
pub mod scoring;

// Re-export commonly used types
pub use analytics::AnalyticsCollector;
pub use challenge::{ChallengeRouter, ChallengeType, TurnstileVerifier};
pub use detection::{AnomalyDetector, BruteForceDetector, CredentialStuffingDetector};
pub use engine::{LastKnownLogin, RiskEngine};
pub use geolocation::GeoIpService;
pub use models::{DailyMetrics, Location, LoginAttempt, RiskFactors, RiskLevel};
pub use persistence::{KeyValueStore, SqliteKeyValueStore};
pub use scoring::{DeviceReputationTracker, RiskCalculator, RiskWeights};
