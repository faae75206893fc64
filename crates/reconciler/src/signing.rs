//! Provider request signing and webhook signature verification
//!
//! Both directions sign the same message, `client_id || timestamp`, with
//! HMAC-SHA256 keyed by the shared API secret. Outbound requests use a
//! millisecond timestamp and base64url without padding; inbound webhooks
//! carry the provider's `Timestamp` header and a standard base64 signature.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::WebhookCredentials;
use crate::error::{ReconcileError, ReconcileResult};

type HmacSha256 = Hmac<Sha256>;

fn mac_digest(secret: &str, client_id: &str, timestamp: &str) -> ReconcileResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ReconcileError::InvalidConfig("invalid HMAC key".to_string()))?;
    mac.update(client_id.as_bytes());
    mac.update(timestamp.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Signature for an outbound provider request (`X-Signature`)
pub fn sign_request(secret: &str, client_id: &str, timestamp_millis: i64) -> ReconcileResult<String> {
    let digest = mac_digest(secret, client_id, &timestamp_millis.to_string())?;
    Ok(URL_SAFE_NO_PAD.encode(digest))
}

/// Expected webhook signature for the given `Timestamp` header value
pub fn webhook_signature(
    credentials: &WebhookCredentials<'_>,
    timestamp: &str,
) -> ReconcileResult<String> {
    let digest = mac_digest(credentials.api_secret, credentials.client_id, timestamp)?;
    Ok(STANDARD.encode(digest))
}

/// Verify a webhook's `Signature` header
///
/// The length check runs first so the constant-time comparison only ever
/// sees equal-length inputs.
pub fn verify_webhook_signature(
    credentials: &WebhookCredentials<'_>,
    timestamp: &str,
    provided: &str,
) -> ReconcileResult<()> {
    let expected = webhook_signature(credentials, timestamp)?;
    let expected = expected.as_bytes();
    let provided = provided.trim().as_bytes();

    if expected.len() != provided.len() {
        return Err(ReconcileError::SignatureInvalid("length mismatch"));
    }

    if bool::from(expected.ct_eq(provided)) {
        Ok(())
    } else {
        Err(ReconcileError::SignatureInvalid("signature mismatch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-provider-secret";
    const CLIENT_ID: &str = "client-123";

    fn creds() -> WebhookCredentials<'static> {
        WebhookCredentials {
            api_secret: SECRET,
            client_id: CLIENT_ID,
        }
    }

    #[test]
    fn test_valid_signature_accepted() {
        let timestamp = "1710000000";
        let signature = webhook_signature(&creds(), timestamp).unwrap();

        assert!(verify_webhook_signature(&creds(), timestamp, &signature).is_ok());
    }

    #[test]
    fn test_every_single_bit_mutation_rejected() {
        let timestamp = "1710000000";
        let signature = webhook_signature(&creds(), timestamp).unwrap();
        let bytes = signature.as_bytes();

        for index in 0..bytes.len() {
            for bit in 0..8 {
                let mut mutated = bytes.to_vec();
                mutated[index] ^= 1 << bit;
                let mutated = String::from_utf8_lossy(&mutated).into_owned();
                assert!(
                    verify_webhook_signature(&creds(), timestamp, &mutated).is_err(),
                    "mutation at byte {} bit {} must be rejected",
                    index,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let timestamp = "1710000000";
        let signature = webhook_signature(&creds(), timestamp).unwrap();

        let err = verify_webhook_signature(&creds(), timestamp, &signature[..10]).unwrap_err();
        assert!(matches!(err, ReconcileError::SignatureInvalid("length mismatch")));
    }

    #[test]
    fn test_different_timestamp_rejected() {
        let signature = webhook_signature(&creds(), "1710000000").unwrap();
        assert!(verify_webhook_signature(&creds(), "1710000001", &signature).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let other = WebhookCredentials {
            api_secret: "another-secret",
            client_id: CLIENT_ID,
        };
        let signature = webhook_signature(&other, "1710000000").unwrap();
        assert!(verify_webhook_signature(&creds(), "1710000000", &signature).is_err());
    }

    #[test]
    fn test_request_signature_is_unpadded_base64url() {
        let signature = sign_request(SECRET, CLIENT_ID, 1_710_000_000_123).unwrap();

        // 32-byte digest -> 43 unpadded characters
        assert_eq!(signature.len(), 43);
        assert!(!signature.contains('='));
        assert!(!signature.contains('+'));
        assert!(!signature.contains('/'));
    }

    #[test]
    fn test_request_signature_matches_manual_hmac() {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}{}", CLIENT_ID, 1_710_000_000_123_i64).as_bytes());
        let expected = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        assert_eq!(sign_request(SECRET, CLIENT_ID, 1_710_000_000_123).unwrap(), expected);
    }
}
