use super::Location;
use serde::{Deserialize, Serialize};

/// Boundary record for the external user directory. Stored at
/// `user:<email>`; `last_login`/`last_location` feed the geo-velocity
/// scorer as the previous-login reference point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
    pub last_location: Option<Location>,
}

/// Session issued on successful login. Stored at `session:<id>` with a
/// 24 hour TTL; the session id doubles as the opaque bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub device_fingerprint: String,
}
