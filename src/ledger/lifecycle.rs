// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Patient and trial lifecycle: creation, status changes, deletion, key
//! rotation and owner-restricted reads.

use std::collections::BTreeSet;

use uuid::Uuid;

use super::{AnchorOutcome, KeyRotationReport, Ledger, PendingAnchor};
use crate::anchor::AnchorError;
use crate::crypto::{self, payload_hash, SealedPayload};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    normalize_tag, AddTrialRequest, ClinicalTrial, ConsentStatus, CreatePatientRequest,
    PatientProfile, SensitiveDataResponse, TrialId, TrialStatus,
};
use crate::storage::{AuditAction, OwnershipEnforcer};

/// Allowed trial status changes. `Completed` is terminal.
pub fn validate_trial_transition(from: TrialStatus, to: TrialStatus) -> LedgerResult<()> {
    let allowed = matches!(
        (from, to),
        (TrialStatus::Active, TrialStatus::Paused)
            | (TrialStatus::Paused, TrialStatus::Active)
            | (TrialStatus::Active, TrialStatus::Completed)
            | (TrialStatus::Paused, TrialStatus::Completed)
    );
    if allowed {
        Ok(())
    } else {
        Err(LedgerError::InvalidInput(format!(
            "trial cannot move from {from:?} to {to:?}"
        )))
    }
}

/// Normalise tags, dropping blanks and duplicates.
fn normalize_set(raw: &[String]) -> BTreeSet<String> {
    raw.iter()
        .map(|s| normalize_tag(s))
        .filter(|s| !s.is_empty())
        .collect()
}

impl Ledger {
    /// Store a new patient profile with consent `Pending`.
    ///
    /// The returned [`PendingAnchor`] describes the anchoring call the
    /// caller should start; the profile is complete without it.
    pub fn create_patient(
        &mut self,
        caller: &str,
        request: CreatePatientRequest,
    ) -> LedgerResult<PendingAnchor> {
        let now = self.clock.now();
        self.enforce_rate_limit(caller, now)?;

        let symptoms = normalize_set(&request.symptoms);
        if symptoms.is_empty() {
            return Err(LedgerError::InvalidInput(
                "symptoms must not be empty".to_string(),
            ));
        }
        let location = normalize_tag(&request.location);
        if location.is_empty() {
            return Err(LedgerError::InvalidInput(
                "location must not be empty".to_string(),
            ));
        }

        let (encrypted_payload, hash) =
            crypto::seal(self.envelope.as_ref(), request.sensitive_data.as_bytes())?;

        let patient_id = Uuid::new_v4().to_string();
        self.store.put_patient(PatientProfile {
            id: patient_id.clone(),
            owner_id: caller.to_string(),
            symptoms,
            location,
            age_group: request.age_group,
            gender: request.gender,
            encrypted_payload,
            payload_hash: hash.clone(),
            consent: ConsentStatus::Pending,
            created_at: now,
            anchor_ref: None,
        });
        self.store.append_audit(
            now,
            caller,
            AuditAction::PatientCreated,
            format!("patient_id={patient_id}"),
        );
        tracing::info!(patient_id = %patient_id, "Patient profile created");

        Ok(PendingAnchor {
            patient_id,
            payload_hash: hash,
            caller_id: caller.to_string(),
        })
    }

    /// Apply the result of an anchoring call started by `create_patient`.
    ///
    /// The profile is looked up again: if it was deleted or its payload
    /// changed in the meantime, a successful result is discarded.
    pub fn complete_anchor(
        &mut self,
        pending: &PendingAnchor,
        result: Result<String, AnchorError>,
    ) -> AnchorOutcome {
        match result {
            Ok(anchor_ref) => match self.store.get_patient_mut(&pending.patient_id) {
                Some(patient) if patient.payload_hash == pending.payload_hash => {
                    patient.anchor_ref = Some(anchor_ref.clone());
                    tracing::debug!(patient_id = %pending.patient_id, anchor_ref = %anchor_ref, "Anchor recorded");
                    AnchorOutcome::Recorded(anchor_ref)
                }
                _ => {
                    tracing::debug!(patient_id = %pending.patient_id, "Discarding stale anchor result");
                    AnchorOutcome::Stale
                }
            },
            Err(e) => {
                let now = self.clock.now();
                tracing::warn!(patient_id = %pending.patient_id, error = %e, "Anchoring failed");
                self.store.append_audit(
                    now,
                    pending.caller_id.as_str(),
                    AuditAction::SystemError,
                    format!("anchoring failed for patient_id={}: {e}", pending.patient_id),
                );
                AnchorOutcome::Failed
            }
        }
    }

    /// Register a trial as `Active`. Caller must be an approved sponsor.
    pub fn add_clinical_trial(
        &mut self,
        caller: &str,
        request: AddTrialRequest,
    ) -> LedgerResult<TrialId> {
        let now = self.clock.now();
        self.enforce_rate_limit(caller, now)?;

        if !request.age_range.is_valid() {
            return Err(LedgerError::InvalidInput(format!(
                "age range min {} exceeds max {}",
                request.age_range.min, request.age_range.max
            )));
        }
        let required_symptoms = normalize_set(&request.required_symptoms);
        if required_symptoms.is_empty() {
            return Err(LedgerError::InvalidInput(
                "required symptoms must not be empty".to_string(),
            ));
        }
        let mut eligible_locations: Vec<String> = Vec::new();
        for location in request.eligible_locations.iter().map(|l| normalize_tag(l)) {
            if !location.is_empty() && !eligible_locations.contains(&location) {
                eligible_locations.push(location);
            }
        }
        if eligible_locations.is_empty() {
            return Err(LedgerError::InvalidInput(
                "eligible locations must not be empty".to_string(),
            ));
        }
        let eligible_genders: BTreeSet<_> = request.eligible_genders.into_iter().collect();
        if eligible_genders.is_empty() {
            return Err(LedgerError::InvalidInput(
                "eligible genders must not be empty".to_string(),
            ));
        }
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(LedgerError::InvalidInput("title must not be empty".to_string()));
        }

        if !(self.oracle.is_approved_sponsor(caller) || self.oracle.is_admin(caller)) {
            return Err(LedgerError::Unauthorized(format!(
                "caller {caller} is not an approved sponsor"
            )));
        }

        let trial_id = Uuid::new_v4().to_string();
        self.store.put_trial(ClinicalTrial {
            id: trial_id.clone(),
            title,
            description: request.description,
            required_symptoms,
            eligible_locations,
            age_range: request.age_range,
            eligible_genders,
            status: TrialStatus::Active,
            sponsor_id: caller.to_string(),
            created_at: now,
        });
        self.store.append_audit(
            now,
            caller,
            AuditAction::TrialAdded,
            format!("trial_id={trial_id}"),
        );
        tracing::info!(trial_id = %trial_id, sponsor = %caller, "Clinical trial added");
        Ok(trial_id)
    }

    /// Move a trial between statuses. Returns the previous status.
    pub fn update_trial_status(
        &mut self,
        caller: &str,
        trial_id: &str,
        status: TrialStatus,
    ) -> LedgerResult<TrialStatus> {
        let now = self.clock.now();
        self.enforce_rate_limit(caller, now)?;

        let trial = self.trial(trial_id)?;
        trial.verify_ownership(caller, self.oracle.as_ref())?;
        let previous = trial.status;
        validate_trial_transition(previous, status)?;

        if let Some(trial) = self.store.get_trial_mut(trial_id) {
            trial.status = status;
        }
        self.store.append_audit(
            now,
            caller,
            AuditAction::TrialStatusUpdated,
            format!("trial_id={trial_id} from={previous:?} to={status:?}"),
        );
        tracing::info!(trial_id = %trial_id, ?previous, ?status, "Trial status updated");
        Ok(previous)
    }

    /// Remove a patient profile. Audit entries that mention it are kept.
    pub fn delete_patient_data(&mut self, caller: &str, patient_id: &str) -> LedgerResult<()> {
        let now = self.clock.now();
        self.enforce_rate_limit(caller, now)?;

        self.patient(patient_id)?
            .verify_ownership(caller, self.oracle.as_ref())?;
        self.store.remove_patient(patient_id);
        self.store.append_audit(
            now,
            caller,
            AuditAction::DataDeleted,
            format!("patient_id={patient_id}"),
        );
        tracing::info!(patient_id = %patient_id, "Patient data deleted");
        Ok(())
    }

    /// Advance the envelope key and re-seal every payload under it.
    ///
    /// A record that cannot be opened (or whose plaintext no longer matches
    /// its hash) stays under its old key and is reported as a `SystemError`
    /// audit entry; the rotation itself still succeeds.
    pub fn rotate_encryption_key(&mut self, caller: &str) -> LedgerResult<KeyRotationReport> {
        let now = self.clock.now();
        self.enforce_rate_limit(caller, now)?;
        self.require_admin(caller)?;

        let key_version = self.envelope.rotate_key()?;
        let mut rotated = 0;
        let mut skipped = 0;

        for patient_id in self.store.patient_ids() {
            let Some(patient) = self.store.get_patient(&patient_id) else {
                continue;
            };
            match self.reseal(&patient.encrypted_payload, &patient.payload_hash) {
                Ok(sealed) => {
                    if let Some(patient) = self.store.get_patient_mut(&patient_id) {
                        patient.encrypted_payload = sealed;
                    }
                    rotated += 1;
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(patient_id = %patient_id, error = %e, "Key rotation skipped record");
                    self.store.append_audit(
                        now,
                        caller,
                        AuditAction::SystemError,
                        format!("key rotation skipped patient_id={patient_id}: {e}"),
                    );
                }
            }
        }

        self.store.append_audit(
            now,
            caller,
            AuditAction::KeyRotated,
            format!("key_version={key_version} rotated={rotated} skipped={skipped}"),
        );
        tracing::info!(key_version, rotated, skipped, "Encryption key rotated");

        Ok(KeyRotationReport {
            key_version,
            rotated,
            skipped,
        })
    }

    fn reseal(&self, sealed: &SealedPayload, expected_hash: &str) -> LedgerResult<SealedPayload> {
        let plaintext = self.open_verified(sealed, expected_hash)?;
        Ok(self.envelope.encrypt(&plaintext)?)
    }

    fn open_verified(&self, sealed: &SealedPayload, expected_hash: &str) -> LedgerResult<Vec<u8>> {
        let plaintext = self.envelope.decrypt(sealed)?;
        if payload_hash(&plaintext) != expected_hash {
            return Err(LedgerError::DecryptionFailed(
                "payload hash mismatch".to_string(),
            ));
        }
        Ok(plaintext)
    }

    /// Profile copy for its owner or an admin.
    pub fn get_patient(&self, caller: &str, patient_id: &str) -> LedgerResult<PatientProfile> {
        let patient = self.patient(patient_id)?;
        patient.verify_ownership(caller, self.oracle.as_ref())?;
        Ok(patient.clone())
    }

    /// Decrypted sensitive payload for its owner or an admin, with the hash
    /// it was verified against.
    pub fn read_sensitive_data(
        &self,
        caller: &str,
        patient_id: &str,
    ) -> LedgerResult<SensitiveDataResponse> {
        let patient = self.patient(patient_id)?;
        patient.verify_ownership(caller, self.oracle.as_ref())?;
        let plaintext = self.open_verified(&patient.encrypted_payload, &patient.payload_hash)?;
        let sensitive_data = String::from_utf8(plaintext)
            .map_err(|_| LedgerError::DecryptionFailed("payload is not valid UTF-8".to_string()))?;
        Ok(SensitiveDataResponse {
            patient_id: patient.id.clone(),
            sensitive_data,
            payload_hash: patient.payload_hash.clone(),
        })
    }
}
