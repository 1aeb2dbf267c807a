// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consent transitions.
//!
//! `Pending` is only ever the initial state. From there a patient may grant
//! or revoke consent, switch between the two, or re-affirm the current
//! choice. Each accepted call is audited, including re-affirmations.

use super::Ledger;
use crate::error::{LedgerError, LedgerResult};
use crate::models::ConsentStatus;
use crate::storage::{AuditAction, OwnershipEnforcer};

pub fn validate_consent_transition(from: ConsentStatus, to: ConsentStatus) -> LedgerResult<()> {
    match to {
        ConsentStatus::Pending => Err(LedgerError::InvalidInput(format!(
            "consent cannot move from {from:?} back to Pending"
        ))),
        ConsentStatus::Granted | ConsentStatus::Revoked => Ok(()),
    }
}

impl Ledger {
    /// Set a patient's consent. Returns the previous status.
    pub fn update_consent(
        &mut self,
        caller: &str,
        patient_id: &str,
        consent: ConsentStatus,
    ) -> LedgerResult<ConsentStatus> {
        let now = self.clock.now();
        self.enforce_rate_limit(caller, now)?;

        let patient = self.patient(patient_id)?;
        patient.verify_ownership(caller, self.oracle.as_ref())?;
        let previous = patient.consent;
        validate_consent_transition(previous, consent)?;

        if let Some(patient) = self.store.get_patient_mut(patient_id) {
            patient.consent = consent;
        }
        self.store.append_audit(
            now,
            caller,
            AuditAction::ConsentUpdated,
            format!("patient_id={patient_id} from={previous:?} to={consent:?}"),
        );
        tracing::info!(patient_id = %patient_id, ?previous, ?consent, "Consent updated");
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::AgeGroup;

    #[test]
    fn transition_table() {
        use ConsentStatus::*;
        assert!(validate_consent_transition(Pending, Granted).is_ok());
        assert!(validate_consent_transition(Pending, Revoked).is_ok());
        assert!(validate_consent_transition(Granted, Revoked).is_ok());
        assert!(validate_consent_transition(Revoked, Granted).is_ok());
        assert!(validate_consent_transition(Granted, Granted).is_ok());
        assert!(validate_consent_transition(Granted, Pending).is_err());
        assert!(validate_consent_transition(Pending, Pending).is_err());
    }

    #[test]
    fn owner_grants_consent_and_audit_records_it() {
        let (mut ledger, _) = test_ledger();
        let pending = ledger
            .create_patient(PATIENT, patient_request(&["cough"], "boston", AgeGroup::Adult))
            .unwrap();

        let previous = ledger
            .update_consent(PATIENT, &pending.patient_id, ConsentStatus::Granted)
            .unwrap();
        assert_eq!(previous, ConsentStatus::Pending);

        let patient = ledger.get_patient(PATIENT, &pending.patient_id).unwrap();
        assert_eq!(patient.consent, ConsentStatus::Granted);

        let last = ledger.get_audit_log().pop().unwrap();
        assert_eq!(last.action, AuditAction::ConsentUpdated);
        assert_eq!(last.caller_id, PATIENT);
        assert!(last.details.contains(&pending.patient_id));
    }

    #[test]
    fn reaffirming_is_allowed_and_audited() {
        let (mut ledger, _) = test_ledger();
        let id = consenting_patient(&mut ledger, &["cough"], "boston");
        let before = ledger.get_audit_log().len();

        let previous = ledger
            .update_consent(PATIENT, &id, ConsentStatus::Granted)
            .unwrap();
        assert_eq!(previous, ConsentStatus::Granted);
        assert_eq!(ledger.get_audit_log().len(), before + 1);
    }

    #[test]
    fn return_to_pending_is_invalid_and_not_audited() {
        let (mut ledger, _) = test_ledger();
        let id = consenting_patient(&mut ledger, &["cough"], "boston");
        let before = ledger.get_audit_log().len();

        let err = ledger
            .update_consent(PATIENT, &id, ConsentStatus::Pending)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
        assert_eq!(ledger.get_audit_log().len(), before);
    }

    #[test]
    fn non_owner_is_unauthorized() {
        let (mut ledger, _) = test_ledger();
        let id = consenting_patient(&mut ledger, &["cough"], "boston");

        let err = ledger
            .update_consent(STRANGER, &id, ConsentStatus::Revoked)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
        assert_eq!(
            ledger.get_patient(PATIENT, &id).unwrap().consent,
            ConsentStatus::Granted
        );
    }

    #[test]
    fn admin_may_revoke() {
        let (mut ledger, _) = test_ledger();
        let id = consenting_patient(&mut ledger, &["cough"], "boston");

        ledger
            .update_consent(ADMIN, &id, ConsentStatus::Revoked)
            .unwrap();
        assert_eq!(
            ledger.get_patient(PATIENT, &id).unwrap().consent,
            ConsentStatus::Revoked
        );
    }

    #[test]
    fn unknown_patient_is_not_found() {
        let (mut ledger, _) = test_ledger();
        let err = ledger
            .update_consent(PATIENT, "missing", ConsentStatus::Granted)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
