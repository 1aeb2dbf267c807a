// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-256-GCM envelope backed by `ring`.
//!
//! Ciphertext framing: `base64(nonce[12] || ciphertext || tag[16])`.
//! The key version is bound as associated data, so a payload relabelled
//! with another version fails authentication.

use base64ct::{Base64, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};

use super::{check_version, CryptoEnvelope, CryptoError, CryptoResult, SealedPayload};

/// Minimum master key length in bytes.
pub const MIN_MASTER_KEY_LEN: usize = 32;

const KEY_LABEL: &[u8] = b"trial-ledger/envelope/v";

pub struct AeadEnvelope {
    master_key: hmac::Key,
    version: u32,
    rng: SystemRandom,
}

impl AeadEnvelope {
    pub fn new(master_key: &[u8]) -> CryptoResult<Self> {
        if master_key.len() < MIN_MASTER_KEY_LEN {
            return Err(CryptoError::KeyMaterial(format!(
                "master key must be at least {MIN_MASTER_KEY_LEN} bytes"
            )));
        }
        Ok(Self {
            master_key: hmac::Key::new(hmac::HMAC_SHA256, master_key),
            version: 1,
            rng: SystemRandom::new(),
        })
    }

    /// Derive the AES key for `version` (HMAC-SHA256 of a versioned label).
    fn key_for(&self, version: u32) -> CryptoResult<LessSafeKey> {
        let mut ctx = hmac::Context::with_key(&self.master_key);
        ctx.update(KEY_LABEL);
        ctx.update(&version.to_be_bytes());
        let derived = ctx.sign();

        let unbound = UnboundKey::new(&AES_256_GCM, derived.as_ref())
            .map_err(|_| CryptoError::KeyMaterial("derived key rejected".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl CryptoEnvelope for AeadEnvelope {
    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }

    fn key_version(&self) -> u32 {
        self.version
    }

    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<SealedPayload> {
        let key = self.key_for(self.version)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::Encryption("nonce generation failed".to_string()))?;

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::from(self.version.to_be_bytes()),
            &mut in_out,
        )
        .map_err(|_| CryptoError::Encryption("seal failed".to_string()))?;

        let mut framed = Vec::with_capacity(NONCE_LEN + in_out.len());
        framed.extend_from_slice(&nonce_bytes);
        framed.extend_from_slice(&in_out);

        Ok(SealedPayload {
            key_version: self.version,
            ciphertext: Base64::encode_string(&framed),
        })
    }

    fn decrypt(&self, sealed: &SealedPayload) -> CryptoResult<Vec<u8>> {
        check_version(sealed.key_version, self.version)?;

        let framed = Base64::decode_vec(&sealed.ciphertext)
            .map_err(|e| CryptoError::Decryption(format!("malformed ciphertext: {e}")))?;
        if framed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CryptoError::Decryption("ciphertext too short".to_string()));
        }

        let (nonce_bytes, body) = framed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| CryptoError::Decryption("bad nonce".to_string()))?;

        let key = self.key_for(sealed.key_version)?;
        let mut in_out = body.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::from(sealed.key_version.to_be_bytes()), &mut in_out)
            .map_err(|_| CryptoError::Decryption("authentication tag mismatch".to_string()))?;
        Ok(plaintext.to_vec())
    }

    fn rotate_key(&mut self) -> CryptoResult<u32> {
        self.version += 1;
        Ok(self.version)
    }

    fn resume_at(&mut self, version: u32) -> CryptoResult<()> {
        if version == 0 {
            return Err(CryptoError::UnknownKeyVersion(0));
        }
        self.version = version;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> AeadEnvelope {
        AeadEnvelope::new(&[42u8; 32]).unwrap()
    }

    #[test]
    fn short_master_key_is_rejected() {
        assert!(matches!(
            AeadEnvelope::new(b"too short"),
            Err(CryptoError::KeyMaterial(_))
        ));
    }

    #[test]
    fn seal_and_open() {
        let envelope = envelope();
        let sealed = envelope.encrypt(b"HbA1c 7.2%").unwrap();
        assert_eq!(envelope.decrypt(&sealed).unwrap(), b"HbA1c 7.2%");
    }

    #[test]
    fn nonces_differ_between_seals() {
        let envelope = envelope();
        let a = envelope.encrypt(b"same").unwrap();
        let b = envelope.encrypt(b"same").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let envelope = envelope();
        let sealed = envelope.encrypt(b"payload").unwrap();

        let mut framed = Base64::decode_vec(&sealed.ciphertext).unwrap();
        let last = framed.len() - 1;
        framed[last] ^= 0x01;
        let tampered = SealedPayload {
            key_version: sealed.key_version,
            ciphertext: Base64::encode_string(&framed),
        };

        assert!(matches!(
            envelope.decrypt(&tampered),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn relabelled_version_fails_authentication() {
        let mut envelope = envelope();
        let sealed = envelope.encrypt(b"payload").unwrap();
        envelope.rotate_key().unwrap();

        let relabelled = SealedPayload {
            key_version: 2,
            ciphertext: sealed.ciphertext.clone(),
        };
        assert!(envelope.decrypt(&relabelled).is_err());
        assert_eq!(envelope.decrypt(&sealed).unwrap(), b"payload");
    }

    #[test]
    fn each_version_derives_a_distinct_key() {
        let mut envelope = envelope();
        let v1 = envelope.encrypt(b"payload").unwrap();
        envelope.rotate_key().unwrap();
        let v2 = envelope.encrypt(b"payload").unwrap();

        // A v2 body cannot be opened with the v1 key even with matching AAD.
        let key = envelope.key_for(1).unwrap();
        let framed = Base64::decode_vec(&v2.ciphertext).unwrap();
        let (nonce, body) = framed.split_at(NONCE_LEN);
        let mut in_out = body.to_vec();
        assert!(key
            .open_in_place(
                Nonce::try_assume_unique_for_key(nonce).unwrap(),
                Aad::from(2u32.to_be_bytes()),
                &mut in_out,
            )
            .is_err());
        assert_eq!(envelope.decrypt(&v1).unwrap(), b"payload");
        assert_eq!(envelope.decrypt(&v2).unwrap(), b"payload");
    }

    #[test]
    fn different_master_keys_cannot_open_each_other() {
        let a = envelope();
        let b = AeadEnvelope::new(&[7u8; 32]).unwrap();
        let sealed = a.encrypt(b"payload").unwrap();
        assert!(b.decrypt(&sealed).is_err());
    }
}
