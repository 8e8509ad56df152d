use crate::challenge::DEFAULT_VERIFY_URL;
use crate::detection::{brute_force, credential_stuffing};
use crate::scoring::RiskWeights;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the risk engine service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Keyed store configuration
    pub store: StoreConfig,
    /// Windowed detector configuration
    pub detection: DetectionConfig,
    /// Composite scoring configuration
    pub risk: RiskConfig,
    /// Challenge verification configuration
    pub challenge: ChallengeConfig,
    /// GeoIP lookup configuration
    pub geoip: GeoIpConfig,
    /// Authentication boundary configuration
    pub auth: AuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "127.0.0.1:8080"
    pub bind_address: String,
}

/// Keyed store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
}

/// Windowed detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Brute force window in seconds
    pub brute_force_window_seconds: i64,
    /// Credential stuffing window in seconds
    pub stuffing_window_seconds: i64,
}

/// Composite scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Detector weights (expected to sum to 1.0)
    pub weights: RiskWeights,
}

/// Challenge verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    /// Shared secret for the verification endpoint
    pub turnstile_secret: String,
    /// Verification endpoint URL
    pub verify_url: String,
}

/// GeoIP lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// Path to a GeoLite2-City.mmdb file; lookups are disabled when
    /// absent
    pub database: Option<PathBuf>,
}

/// Authentication boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Salt mixed into stored password digests
    pub password_salt: String,
    /// Session lifetime in seconds
    pub session_ttl_seconds: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                bind_address: "127.0.0.1:8080".to_string(),
            },
            store: StoreConfig {
                db_path: PathBuf::from("heimdall.db"),
            },
            detection: DetectionConfig {
                brute_force_window_seconds: brute_force::DEFAULT_WINDOW_SECONDS,
                stuffing_window_seconds: credential_stuffing::DEFAULT_WINDOW_SECONDS,
            },
            risk: RiskConfig {
                weights: RiskWeights::default(),
            },
            challenge: ChallengeConfig {
                turnstile_secret: String::new(),
                verify_url: DEFAULT_VERIFY_URL.to_string(),
            },
            geoip: GeoIpConfig { database: None },
            auth: AuthConfig {
                password_salt: "adaptive-auth-salt".to_string(),
                session_ttl_seconds: 24 * 3600,
            },
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
