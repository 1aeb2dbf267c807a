// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reversible keyed transform used when no master key is configured.
//!
//! XORs the plaintext with a SHA-256 counter-mode keystream. It hides data
//! from casual inspection only and offers no integrity; the ledger's payload
//! hash check is what catches tampering.

use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha256};

use super::{check_version, CryptoEnvelope, CryptoError, CryptoResult, SealedPayload};

pub struct PlaceholderEnvelope {
    seed: Vec<u8>,
    version: u32,
}

impl PlaceholderEnvelope {
    pub fn new(seed: &[u8]) -> Self {
        Self {
            seed: seed.to_vec(),
            version: 1,
        }
    }

    fn key_for(&self, version: u32) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.seed);
        hasher.update(version.to_be_bytes());
        hasher.finalize().into()
    }

    fn apply_keystream(key: &[u8; 32], data: &mut [u8]) {
        for (block_index, chunk) in data.chunks_mut(32).enumerate() {
            let mut hasher = Sha256::new();
            hasher.update(key);
            hasher.update((block_index as u64).to_be_bytes());
            let block = hasher.finalize();
            for (byte, k) in chunk.iter_mut().zip(block.iter()) {
                *byte ^= k;
            }
        }
    }
}

impl CryptoEnvelope for PlaceholderEnvelope {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn key_version(&self) -> u32 {
        self.version
    }

    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<SealedPayload> {
        let mut data = plaintext.to_vec();
        Self::apply_keystream(&self.key_for(self.version), &mut data);
        Ok(SealedPayload {
            key_version: self.version,
            ciphertext: Base64::encode_string(&data),
        })
    }

    fn decrypt(&self, sealed: &SealedPayload) -> CryptoResult<Vec<u8>> {
        check_version(sealed.key_version, self.version)?;
        let mut data = Base64::decode_vec(&sealed.ciphertext)
            .map_err(|e| CryptoError::Decryption(format!("malformed ciphertext: {e}")))?;
        Self::apply_keystream(&self.key_for(sealed.key_version), &mut data);
        Ok(data)
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
