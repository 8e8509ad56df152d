pub mod anomaly;
pub mod brute_force;
pub mod credential_stuffing;
pub mod geo_velocity;

pub use anomaly::{AnomalyDetector, UserBaseline};
pub use brute_force::BruteForceDetector;
pub use credential_stuffing::CredentialStuffingDetector;
pub use geo_velocity::{calculate_geo_velocity_score, haversine_km, is_new_location};
