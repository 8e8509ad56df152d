//! Third-party challenge token verification
//!
//! The only network hop inside the hot path. The call is bounded by the
//! client timeout and fails closed: any transport or decode failure is
//! reported as an unsuccessful verification.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_VERIFY_URL: &str =
    "https://challenges.cloudflare.com/turnstile/v0/siteverify";

const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Wire result of the verification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    #[serde(rename = "error-codes", default, skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_ts: Option<String>,
}

impl VerificationResult {
    fn network_error() -> Self {
        VerificationResult {
            success: false,
            error_codes: vec!["network-error".to_string()],
            hostname: None,
            challenge_ts: None,
        }
    }
}

/// Verifies challenge tokens against the configured endpoint.
pub struct TurnstileVerifier {
    client: Client,
    secret: String,
    verify_url: String,
}

impl TurnstileVerifier {
    pub fn new(secret: impl Into<String>, verify_url: impl Into<String>) -> Self {
        TurnstileVerifier {
            client: Client::builder()
                .timeout(VERIFY_TIMEOUT)
                .build()
                .unwrap_or_default(),
            secret: secret.into(),
            verify_url: verify_url.into(),
        }
    }

    /// Verify a challenge token, optionally binding it to the client IP.
    pub async fn verify(&self, token: &str, remote_ip: Option<&str>) -> VerificationResult {
        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = match self.client.post(&self.verify_url).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Challenge verification request failed: {}", e);
                return VerificationResult::network_error();
            }
        };

        match response.json::<VerificationResult>().await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Challenge verification returned invalid body: {}", e);
                VerificationResult::network_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_deserializes_wire_shape() {
        let result: VerificationResult = serde_json::from_str(
            r#"{"success": true, "hostname": "example.com", "challenge_ts": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(result.success);
        assert!(result.error_codes.is_empty());
        assert_eq!(result.hostname.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_result_deserializes_error_codes() {
        let result: VerificationResult = serde_json::from_str(
            r#"{"success": false, "error-codes": ["invalid-input-response"]}"#,
        )
        .unwrap();
        assert!(!result.success);
        assert_eq!(result.error_codes, vec!["invalid-input-response"]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_closed() {
        // A port that nothing listens on: the transport error must map
        // to an unsuccessful verification, never a pass.
        let verifier = TurnstileVerifier::new("secret", "http://127.0.0.1:1/verify");
        let result = verifier.verify("token", Some("1.2.3.4")).await;

        assert!(!result.success);
        assert_eq!(result.error_codes, vec!["network-error"]);
    }
}
