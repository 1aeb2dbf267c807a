// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Crypto Envelope
//!
//! Seals patient payloads before they enter the state store and attests
//! eligibility for match results.
//!
//! ## Implementations
//!
//! - [`PlaceholderEnvelope`] - reversible keyed transform, no integrity
//! - [`AeadEnvelope`] - AES-256-GCM via `ring`, key version bound as AAD
//!
//! Both derive one key per version from a root secret, so a record sealed
//! under any earlier version stays readable after rotation. Callers only
//! see the [`CryptoEnvelope`] trait; swapping implementations never touches
//! the ledger.

pub mod aead;
pub mod placeholder;
pub mod proof;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

pub use aead::AeadEnvelope;
pub use placeholder::PlaceholderEnvelope;
pub use proof::{HmacProofGenerator, ProofGenerator};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("no key material for version {0}")]
    UnknownKeyVersion(u32),

    #[error("invalid key material: {0}")]
    KeyMaterial(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Ciphertext plus the key version it was sealed under.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SealedPayload {
    pub key_version: u32,
    /// Base64 ciphertext (implementation-defined framing).
    pub ciphertext: String,
}

/// Pluggable payload cipher.
pub trait CryptoEnvelope: Send + Sync {
    /// Short identifier used in logs and stats.
    fn name(&self) -> &'static str;

    /// Version new payloads are sealed under.
    fn key_version(&self) -> u32;

    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<SealedPayload>;

    /// Open a payload sealed under any version up to the current one.
    fn decrypt(&self, sealed: &SealedPayload) -> CryptoResult<Vec<u8>>;

    /// Advance to a fresh key version and return it.
    fn rotate_key(&mut self) -> CryptoResult<u32>;

    /// Resume at a version recorded in a snapshot.
    fn resume_at(&mut self, version: u32) -> CryptoResult<()>;
}

/// Encrypt `plaintext` and return the sealed payload with its content hash.
pub fn seal(
    envelope: &dyn CryptoEnvelope,
    plaintext: &[u8],
) -> CryptoResult<(SealedPayload, String)> {
    let sealed = envelope.encrypt(plaintext)?;
    Ok((sealed, payload_hash(plaintext)))
}

/// Lowercase hex SHA-256 of the plaintext.
pub fn payload_hash(plaintext: &[u8]) -> String {
    hex::encode(Sha256::digest(plaintext))
}

/// Reject versions the envelope has never issued.
pub(crate) fn check_version(version: u32, current: u32) -> CryptoResult<()> {
    if version == 0 || version > current {
        Err(CryptoError::UnknownKeyVersion(version))
    } else {
        Ok(())
    }
}
