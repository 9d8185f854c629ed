//! Webhook signature verification.
//!
//! The provider sends `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`
//! where each `v1` is `HMAC-SHA256(secret, "<t>.<raw body>")`. Several `v1`
//! entries appear while a secret is being rolled; any match is accepted.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::PaymentError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verifies webhook payloads against the shared signing secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance_secs: SIGNATURE_TOLERANCE_SECS,
        }
    }

    /// Verify a signature header against the raw request body, using the
    /// current time for the replay window.
    ///
    /// Returns `Ok(false)` for a well-formed header whose signature does not
    /// match or whose timestamp is outside the tolerance.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignatureHeader` if the header is
    /// malformed or lacks a timestamp or `v1` signature.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<bool, PaymentError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// [`Self::verify`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`Self::verify`].
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<bool, PaymentError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                return Err(PaymentError::InvalidSignatureHeader(
                    "expected key=value pairs".to_string(),
                ));
            };
            match key {
                "t" => {
                    let parsed = value.parse::<i64>().map_err(|_| {
                        PaymentError::InvalidSignatureHeader("invalid timestamp".to_string())
                    })?;
                    timestamp = Some(parsed);
                }
                "v1" => signatures.push(value),
                // v0 and future schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::InvalidSignatureHeader("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(PaymentError::InvalidSignatureHeader(
                "missing v1 signature".to_string(),
            ));
        }

        if now.abs_diff(timestamp) > self.tolerance_secs.unsigned_abs() {
            tracing::warn!(timestamp, now, "Webhook timestamp outside tolerance");
            return Ok(false);
        }

        let expected = self.compute(payload, timestamp)?;
        Ok(signatures
            .iter()
            .any(|candidate| constant_time_compare(candidate, &expected)))
    }

    /// Build a valid signature header for a payload, as the provider would.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Config` if the secret cannot key an HMAC.
    pub fn signature_header(&self, payload: &[u8], timestamp: i64) -> Result<String, PaymentError> {
        Ok(format!("t={timestamp},v1={}", self.compute(payload, timestamp)?))
    }

    fn compute(&self, payload: &[u8], timestamp: i64) -> Result<String, PaymentError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| PaymentError::Config(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_767_225_600;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::from("whsec_test123secret456"))
    }

    #[test]
    fn test_valid_signature() {
        let v = verifier();
        let payload = br#"{"id":"evt_1"}"#;
        let header = v.signature_header(payload, NOW).unwrap();

        assert!(v.verify_at(payload, &header, NOW + 10).unwrap());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = WebhookVerifier::new(SecretString::from("whsec_other"))
            .signature_header(payload, NOW)
            .unwrap();

        assert!(!verifier().verify_at(payload, &header, NOW).unwrap());
    }

    #[test]
    fn test_modified_payload_rejected() {
        let v = verifier();
        let header = v.signature_header(br#"{"amount":100}"#, NOW).unwrap();

        assert!(!v.verify_at(br#"{"amount":1}"#, &header, NOW).unwrap());
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let v = verifier();
        let payload = b"{}";
        let header = v.signature_header(payload, NOW - 301).unwrap();

        assert!(!v.verify_at(payload, &header, NOW).unwrap());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let v = verifier();
        let payload = b"{}";

        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={t},v1=ab");
            assert!(!v.verify_at(payload, &header, NOW).unwrap());
        }
        let header = v.signature_header(payload, NOW).unwrap();
        assert!(!v.verify_at(payload, &header, i64::MIN).unwrap());
    }

    #[test]
    fn test_any_v1_may_match() {
        let v = verifier();
        let payload = b"{}";
        let good = v.signature_header(payload, NOW).unwrap();
        let sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1={},v1={sig}", "0".repeat(64));

        assert!(v.verify_at(payload, &header, NOW).unwrap());
    }

    #[test]
    fn test_malformed_headers_error() {
        let v = verifier();
        assert!(v.verify_at(b"{}", "", NOW).is_err());
        assert!(v.verify_at(b"{}", "garbage", NOW).is_err());
        assert!(v.verify_at(b"{}", "v1=abc", NOW).is_err());
        assert!(v.verify_at(b"{}", &format!("t={NOW}"), NOW).is_err());
        assert!(v.verify_at(b"{}", "t=soon,v1=abc", NOW).is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
