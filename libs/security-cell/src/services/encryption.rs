// =====================================================================================
// ENCRYPTION SERVICE - AES-256-GCM FOR DATA AT REST
// =====================================================================================

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::models::SecurityError;

#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    /// Base64 nonce, stored next to the ciphertext's metadata row.
    pub nonce: String,
}

#[cfg_attr(test, derive(Debug))]
pub struct EncryptionService {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl EncryptionService {
    pub fn new(key_base64: &str) -> Result<Self, SecurityError> {
        let key_bytes = BASE64
            .decode(key_base64.trim())
            .map_err(|e| SecurityError::InvalidKey(e.to_string()))?;

        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes)
            .map_err(|_| SecurityError::InvalidKey(format!("expected 32 bytes, got {}", key_bytes.len())))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedPayload, SecurityError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| SecurityError::EncryptionError("nonce generation failed".to_string()))?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce_bytes), Aad::empty(), &mut in_out)
            .map_err(|_| SecurityError::EncryptionError("seal failed".to_string()))?;

        Ok(EncryptedPayload {
            ciphertext: in_out,
            nonce: BASE64.encode(nonce_bytes),
        })
    }

    pub fn decrypt(&self, ciphertext: &[u8], nonce_base64: &str) -> Result<Vec<u8>, SecurityError> {
        let nonce_vec = BASE64
            .decode(nonce_base64)
            .map_err(|e| SecurityError::EncryptionError(format!("invalid nonce: {}", e)))?;
        let nonce_bytes: [u8; NONCE_LEN] = nonce_vec
            .try_into()
            .map_err(|_| SecurityError::EncryptionError("invalid nonce length".to_string()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(Nonce::assume_unique_for_key(nonce_bytes), Aad::empty(), &mut in_out)
            .map_err(|_| SecurityError::EncryptionError("authentication failed".to_string()))?;

        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

    #[test]
    fn encrypt_then_decrypt() {
        let service = EncryptionService::new(KEY).unwrap();
        let payload = service.encrypt(b"blood panel results").unwrap();

        assert_ne!(payload.ciphertext, b"blood panel results".to_vec());
        let plain = service.decrypt(&payload.ciphertext, &payload.nonce).unwrap();
        assert_eq!(plain, b"blood panel results".to_vec());
    }

    #[test]
    fn nonces_are_not_reused() {
        let service = EncryptionService::new(KEY).unwrap();
        let a = service.encrypt(b"same").unwrap();
        let b = service.encrypt(b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let service = EncryptionService::new(KEY).unwrap();
        let mut payload = service.encrypt(b"x-ray").unwrap();
        payload.ciphertext[0] ^= 0xff;
        assert_matches!(
            service.decrypt(&payload.ciphertext, &payload.nonce),
            Err(SecurityError::EncryptionError(_))
        );
    }

    #[test]
    fn rejects_short_key() {
        assert_matches!(EncryptionService::new("c2hvcnQ="), Err(SecurityError::InvalidKey(_)));
    }
}
