use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::PaymentError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";

/// Hex encoded HMAC-SHA256 of the raw body.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> Result<(), PaymentError> {
    if secret.is_empty() {
        return Err(PaymentError::NotConfigured);
    }

    let expected = hex::decode(signature.trim()).map_err(|_| PaymentError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured)?;
    mac.update(payload);
    // Constant-time comparison
    mac.verify_slice(&expected).map_err(|_| PaymentError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn accepts_matching_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let signature = sign_payload("whsec_test", body).unwrap();
        assert!(verify_signature("whsec_test", body, &signature).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let signature = sign_payload("whsec_test", b"original").unwrap();
        assert_matches!(
            verify_signature("whsec_test", b"tampered", &signature),
            Err(PaymentError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_non_hex_signature() {
        assert_matches!(
            verify_signature("whsec_test", b"body", "not-hex"),
            Err(PaymentError::InvalidSignature)
        );
    }

    #[test]
    fn missing_secret_is_configuration_error() {
        assert_matches!(verify_signature("", b"body", "00"), Err(PaymentError::NotConfigured));
    }
}
