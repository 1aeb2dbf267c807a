// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Eligibility attestations attached to match results.

use chrono::{DateTime, Utc};
use ring::hmac;

const PROOF_PREFIX: &str = "proof:v1";

/// Produces opaque strings binding a patient, a trial and a point in time.
pub trait ProofGenerator: Send + Sync {
    fn prove(&self, patient_id: &str, trial_id: &str, at: DateTime<Utc>) -> String;

    fn verify(&self, proof: &str, patient_id: &str, trial_id: &str) -> bool;
}

/// HMAC-SHA256 attestation: `proof:v1:<unix-ts>:<hex tag>`.
pub struct HmacProofGenerator {
    key: hmac::Key,
}

impl HmacProofGenerator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    fn message(patient_id: &str, trial_id: &str, ts: i64) -> String {
        format!("{patient_id}|{trial_id}|{ts}")
    }
}

impl ProofGenerator for HmacProofGenerator {
    fn prove(&self, patient_id: &str, trial_id: &str, at: DateTime<Utc>) -> String {
        let ts = at.timestamp();
        let tag = hmac::sign(&self.key, Self::message(patient_id, trial_id, ts).as_bytes());
        format!("{PROOF_PREFIX}:{ts}:{}", hex::encode(tag.as_ref()))
    }

    fn verify(&self, proof: &str, patient_id: &str, trial_id: &str) -> bool {
        let Some(rest) = proof.strip_prefix(PROOF_PREFIX).and_then(|r| r.strip_prefix(':')) else {
            return false;
        };
        let Some((ts, tag_hex)) = rest.split_once(':') else {
            return false;
        };
        let Ok(ts) = ts.parse::<i64>() else {
            return false;
        };
        let Ok(tag) = hex::decode(tag_hex) else {
            return false;
        };

        hmac::verify(
            &self.key,
            Self::message(patient_id, trial_id, ts).as_bytes(),
            &tag,
        )
        .is_ok()
    }
}
