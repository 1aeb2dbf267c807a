// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Data Models
//!
//! Records owned by the ledger (patients, trials) and the derived values it
//! hands out (match results). Every type here is returned to callers by value;
//! nothing outside the ledger holds a reference into its maps.
//!
//! ## Model Categories
//!
//! - **Patients**: consent-gated profiles with an encrypted payload
//! - **Trials**: sponsor-owned listings with eligibility criteria
//! - **Matches**: scored, attested trial suggestions (never persisted)

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::crypto::SealedPayload;

/// Opaque patient identifier (UUID v4).
pub type PatientId = String;

/// Opaque trial identifier (UUID v4).
pub type TrialId = String;

/// Authenticated caller identity (JWT `sub`).
pub type CallerId = String;

/// Sentinel caller recorded for system-internal events.
pub const ANONYMOUS_CALLER: &str = "anonymous";

// =============================================================================
// Demographics
// =============================================================================

/// Coarse age band used for eligibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    Child,
    Adult,
    Senior,
}

impl AgeGroup {
    /// Inclusive age bounds of the band, used for demographic fit.
    pub fn band(&self) -> (u32, u32) {
        match self {
            AgeGroup::Child => (0, 18),
            AgeGroup::Adult => (18, 65),
            AgeGroup::Senior => (65, 90),
        }
    }

    /// Whether a trial accepting `range` can enrol someone in this band.
    pub fn is_compatible_with(&self, range: &AgeRange) -> bool {
        match self {
            AgeGroup::Child => range.min <= 18,
            AgeGroup::Adult => range.min <= 65 && range.max >= 18,
            AgeGroup::Senior => range.max >= 65,
        }
    }

    /// Whether `range` spans the whole band rather than a slice of it.
    pub fn is_covered_by(&self, range: &AgeRange) -> bool {
        let (lo, hi) = self.band();
        range.min <= lo && range.max >= hi
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Nonbinary,
    Unspecified,
}

impl Gender {
    pub const ALL: [Gender; 4] = [
        Gender::Male,
        Gender::Female,
        Gender::Nonbinary,
        Gender::Unspecified,
    ];
}

/// Inclusive age range accepted by a trial.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

impl AgeRange {
    /// Widest range a trial can declare; anything narrower restricts age.
    pub const OPEN: AgeRange = AgeRange { min: 0, max: 120 };

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    pub fn restricts(&self) -> bool {
        self.min > Self::OPEN.min || self.max < Self::OPEN.max
    }
}

// =============================================================================
// Patient Models
// =============================================================================

/// Patient consent for matching.
///
/// Only `Granted` profiles are ever considered by the matching engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
    Pending,
    Granted,
    Revoked,
}

impl Default for ConsentStatus {
    fn default() -> Self {
        ConsentStatus::Pending
    }
}

/// A patient's matching-relevant data plus its sealed sensitive payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PatientProfile {
    /// Unique patient identifier.
    pub id: PatientId,
    /// Caller that created the profile; consent and deletion rights follow it.
    pub owner_id: CallerId,
    /// Normalised (trimmed, lowercase) symptom tags.
    pub symptoms: BTreeSet<String>,
    /// Normalised location.
    pub location: String,
    pub age_group: AgeGroup,
    pub gender: Gender,
    /// Ciphertext of the sensitive payload.
    pub encrypted_payload: SealedPayload,
    /// Hex SHA-256 of the sensitive plaintext.
    pub payload_hash: String,
    pub consent: ConsentStatus,
    pub created_at: DateTime<Utc>,
    /// External anchor reference, filled in once anchoring succeeds.
    pub anchor_ref: Option<String>,
}

/// Request to create a patient profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePatientRequest {
    pub symptoms: Vec<String>,
    pub location: String,
    pub age_group: AgeGroup,
    pub gender: Gender,
    /// Free-form sensitive data; sealed before it is stored.
    pub sensitive_data: String,
}

/// Response after a patient profile was created.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePatientResponse {
    pub patient_id: PatientId,
    pub payload_hash: String,
}

/// Request to move a patient's consent to a new state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateConsentRequest {
    pub consent: ConsentStatus,
}

/// Decrypted sensitive payload returned to the owner.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SensitiveDataResponse {
    pub patient_id: PatientId,
    pub sensitive_data: String,
    pub payload_hash: String,
}

// =============================================================================
// Trial Models
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    Active,
    Paused,
    Completed,
}

/// A clinical trial listing. Trials are never deleted, only transitioned.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ClinicalTrial {
    pub id: TrialId,
    pub title: String,
    pub description: String,
    /// Normalised symptom tags; at least one must match a patient.
    pub required_symptoms: BTreeSet<String>,
    /// Normalised locations; the first entry is the primary site.
    pub eligible_locations: Vec<String>,
    pub age_range: AgeRange,
    pub eligible_genders: BTreeSet<Gender>,
    pub status: TrialStatus,
    /// Registering caller; owns status transitions.
    pub sponsor_id: CallerId,
    pub created_at: DateTime<Utc>,
}

/// Request to register a clinical trial.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddTrialRequest {
    pub title: String,
    pub description: String,
    pub required_symptoms: Vec<String>,
    pub eligible_locations: Vec<String>,
    pub age_range: AgeRange,
    pub eligible_genders: Vec<Gender>,
}

/// Response after a trial was registered.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddTrialResponse {
    pub trial_id: TrialId,
}

/// Request to change a trial's status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateTrialStatusRequest {
    pub status: TrialStatus,
}

// =============================================================================
// Match Models
// =============================================================================

/// One scored trial suggestion for a patient. Derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct MatchResult {
    pub trial_id: TrialId,
    /// Weighted suitability in `[0, 1]`.
    pub match_score: f64,
    /// Opaque attestation binding patient, trial and time.
    pub eligibility_proof: String,
    /// Patient fields the trial needs disclosed.
    pub required_data_fields: Vec<String>,
}

/// Trim and lowercase a free-text tag.
pub fn normalize_tag(raw: &str) -> String {
    raw.trim().to_lowercase()
}
