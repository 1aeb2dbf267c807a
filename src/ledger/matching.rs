// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Eligibility filter and match scoring.
//!
//! Score weights: symptoms 0.4, location 0.3, demographics 0.3.

use super::Ledger;
use crate::error::LedgerResult;
use crate::models::{
    ClinicalTrial, ConsentStatus, Gender, MatchResult, PatientProfile, TrialStatus,
};
use crate::storage::AuditAction;

const SYMPTOM_WEIGHT: f64 = 0.4;
const LOCATION_WEIGHT: f64 = 0.3;
const DEMOGRAPHIC_WEIGHT: f64 = 0.3;

const PRIMARY_LOCATION_SCORE: f64 = 1.0;
const SECONDARY_LOCATION_SCORE: f64 = 0.25;

const FULL_DEMOGRAPHIC_FIT: f64 = 0.3;
const PARTIAL_DEMOGRAPHIC_FIT: f64 = 0.15;

/// Whether `patient` may be offered `trial`. Consent is part of eligibility.
pub fn is_eligible(patient: &PatientProfile, trial: &ClinicalTrial) -> bool {
    patient.consent == ConsentStatus::Granted
        && trial.status == TrialStatus::Active
        && trial.eligible_locations.contains(&patient.location)
        && !patient.symptoms.is_disjoint(&trial.required_symptoms)
        && patient.age_group.is_compatible_with(&trial.age_range)
        && trial.eligible_genders.contains(&patient.gender)
}

/// Weighted suitability in `[0, 1]`. Only meaningful for eligible pairs.
pub fn match_score(patient: &PatientProfile, trial: &ClinicalTrial) -> f64 {
    let required = trial.required_symptoms.len();
    let symptom_score = if required == 0 {
        0.0
    } else {
        let matched = patient.symptoms.intersection(&trial.required_symptoms).count();
        matched as f64 / required as f64
    };

    let location_score = match trial.eligible_locations.first() {
        Some(primary) if *primary == patient.location => PRIMARY_LOCATION_SCORE,
        _ => SECONDARY_LOCATION_SCORE,
    };

    let demographic_fit = if patient.age_group.is_covered_by(&trial.age_range) {
        FULL_DEMOGRAPHIC_FIT
    } else {
        PARTIAL_DEMOGRAPHIC_FIT
    };

    let score = SYMPTOM_WEIGHT * symptom_score
        + LOCATION_WEIGHT * location_score
        + DEMOGRAPHIC_WEIGHT * demographic_fit;
    score.clamp(0.0, 1.0)
}

/// Patient fields the trial needs disclosed to confirm eligibility.
pub fn required_data_fields(trial: &ClinicalTrial) -> Vec<String> {
    let mut fields = vec!["symptoms".to_string(), "location".to_string()];
    if trial.age_range.restricts() {
        fields.push("age_group".to_string());
    }
    if trial.eligible_genders.len() < Gender::ALL.len() {
        fields.push("gender".to_string());
    }
    fields
}

impl Ledger {
    /// Eligible active trials for a patient, best match first.
    ///
    /// A patient without granted consent always gets an empty list. The
    /// request itself is audited either way.
    pub fn find_trials(&mut self, caller: &str, patient_id: &str) -> LedgerResult<Vec<MatchResult>> {
        let now = self.clock.now();
        self.enforce_rate_limit(caller, now)?;

        let patient = self.patient(patient_id)?;
        let mut results: Vec<MatchResult> = if patient.consent == ConsentStatus::Granted {
            self.store
                .trials()
                .filter(|trial| is_eligible(patient, trial))
                .map(|trial| MatchResult {
                    trial_id: trial.id.clone(),
                    match_score: match_score(patient, trial),
                    eligibility_proof: self.proofs.prove(patient_id, &trial.id, now),
                    required_data_fields: required_data_fields(trial),
                })
                .collect()
        } else {
            Vec::new()
        };

        results.sort_by(|a, b| {
            b.match_score
                .total_cmp(&a.match_score)
                .then_with(|| a.trial_id.cmp(&b.trial_id))
        });

        self.store.append_audit(
            now,
            caller,
            AuditAction::MatchRequested,
            format!("patient_id={patient_id} results={}", results.len()),
        );
        tracing::debug!(patient_id = %patient_id, results = results.len(), "Match request served");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::crypto::{HmacProofGenerator, ProofGenerator};
    use crate::error::LedgerError;
    use crate::models::{AgeGroup, AgeRange, TrialStatus};
    use std::collections::BTreeSet;

    #[test]
    fn reference_example_scores_079() {
        let (mut ledger, _) = test_ledger();
        let patient_id = consenting_patient(&mut ledger, &["cough", "fever"], "Boston");
        let mut request = trial_request(&["cough"], &["Boston"], 18, 65);
        request.eligible_genders = vec![Gender::Female, Gender::Male];
        let trial_id = ledger.add_clinical_trial(SPONSOR, request).unwrap();

        let results = ledger.find_trials(PATIENT, &patient_id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].trial_id, trial_id);
        assert!((results[0].match_score - 0.79).abs() < 1e-9);
    }

    #[test]
    fn paused_trial_is_excluded() {
        let (mut ledger, _) = test_ledger();
        let patient_id = consenting_patient(&mut ledger, &["cough", "fever"], "Boston");
        let trial_id = ledger
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["Boston"], 18, 65))
            .unwrap();
        ledger
            .update_trial_status(SPONSOR, &trial_id, TrialStatus::Paused)
            .unwrap();

        assert!(ledger.find_trials(PATIENT, &patient_id).unwrap().is_empty());
    }

    #[test]
    fn non_consenting_patient_gets_nothing_but_request_is_audited() {
        let (mut ledger, _) = test_ledger();
        let pending = ledger
            .create_patient(PATIENT, patient_request(&["cough"], "boston", AgeGroup::Adult))
            .unwrap();
        ledger
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["boston"], 18, 65))
            .unwrap();

        let before = ledger.get_audit_log().len();
        assert!(ledger.find_trials(PATIENT, &pending.patient_id).unwrap().is_empty());
        let log = ledger.get_audit_log();
        assert_eq!(log.len(), before + 1);
        assert_eq!(log[before].action, AuditAction::MatchRequested);

        ledger
            .update_consent(PATIENT, &pending.patient_id, ConsentStatus::Revoked)
            .unwrap();
        assert!(ledger.find_trials(PATIENT, &pending.patient_id).unwrap().is_empty());
    }

    #[test]
    fn results_sorted_by_score_then_id() {
        let (mut ledger, _) = test_ledger();
        let patient_id = consenting_patient(&mut ledger, &["cough", "fever"], "boston");

        // Secondary location -> lower score
        let low = ledger
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["denver", "boston"], 18, 65))
            .unwrap();
        let high_a = ledger
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["boston"], 18, 65))
            .unwrap();
        let high_b = ledger
            .add_clinical_trial(SPONSOR, trial_request(&["fever"], &["boston"], 18, 65))
            .unwrap();

        let results = ledger.find_trials(PATIENT, &patient_id).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.trial_id.as_str()).collect();

        let mut tied = vec![high_a.as_str(), high_b.as_str()];
        tied.sort();
        assert_eq!(ids, vec![tied[0], tied[1], low.as_str()]);
        assert!(results[0].match_score >= results[2].match_score);

        // Deterministic across calls
        let again = ledger.find_trials(PATIENT, &patient_id).unwrap();
        let again_ids: Vec<&str> = again.iter().map(|r| r.trial_id.as_str()).collect();
        assert_eq!(ids, again_ids);
    }

    #[test]
    fn eligibility_filters_each_criterion() {
        let (mut ledger, _) = test_ledger();
        let patient_id = consenting_patient(&mut ledger, &["cough"], "boston");

        // wrong location
        ledger
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["denver"], 18, 65))
            .unwrap();
        // no symptom overlap
        ledger
            .add_clinical_trial(SPONSOR, trial_request(&["rash"], &["boston"], 18, 65))
            .unwrap();
        // seniors only
        ledger
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["boston"], 70, 95))
            .unwrap();
        // gender mismatch (patient is female)
        let mut males = trial_request(&["cough"], &["boston"], 18, 65);
        males.eligible_genders = vec![Gender::Male];
        ledger.add_clinical_trial(SPONSOR, males).unwrap();

        assert!(ledger.find_trials(PATIENT, &patient_id).unwrap().is_empty());
    }

    #[test]
    fn location_matching_is_case_insensitive() {
        let (mut ledger, _) = test_ledger();
        let patient_id = consenting_patient(&mut ledger, &[" Cough "], "  BOSTON ");
        ledger
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["Boston"], 0, 120))
            .unwrap();

        assert_eq!(ledger.find_trials(PATIENT, &patient_id).unwrap().len(), 1);
    }

    #[test]
    fn proofs_verify_for_patient_and_trial() {
        let (mut ledger, _) = test_ledger();
        let patient_id = consenting_patient(&mut ledger, &["cough"], "boston");
        let trial_id = ledger
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["boston"], 18, 65))
            .unwrap();

        let results = ledger.find_trials(PATIENT, &patient_id).unwrap();
        let proofs = HmacProofGenerator::new(b"test-proof-secret");
        assert!(proofs.verify(&results[0].eligibility_proof, &patient_id, &trial_id));
        assert!(!proofs.verify(&results[0].eligibility_proof, "other", &trial_id));
    }

    #[test]
    fn unknown_patient_is_not_found_and_not_audited() {
        let (mut ledger, _) = test_ledger();
        let before = ledger.get_audit_log().len();
        let err = ledger.find_trials(PATIENT, "missing").unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert_eq!(ledger.get_audit_log().len(), before);
    }

    #[test]
    fn stranger_sees_nothing_for_pending_or_revoked_patient() {
        let (mut ledger, _) = test_ledger();
        let pending = ledger
            .create_patient(PATIENT, patient_request(&["cough"], "boston", AgeGroup::Adult))
            .unwrap();
        ledger
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["boston"], 18, 65))
            .unwrap();

        assert!(ledger.find_trials(STRANGER, &pending.patient_id).unwrap().is_empty());

        ledger
            .update_consent(PATIENT, &pending.patient_id, ConsentStatus::Granted)
            .unwrap();
        ledger
            .update_consent(PATIENT, &pending.patient_id, ConsentStatus::Revoked)
            .unwrap();
        assert!(ledger.find_trials(STRANGER, &pending.patient_id).unwrap().is_empty());

        let last = ledger.get_audit_log().pop().unwrap();
        assert_eq!(last.action, AuditAction::MatchRequested);
        assert_eq!(last.caller_id, STRANGER);
    }

    #[test]
    fn find_trials_is_rate_limited() {
        let clock = std::sync::Arc::new(crate::clock::ManualClock::new(start_time()));
        let mut ledger = Ledger::new(deps_with(clock.clone(), 3));
        let patient_id = consenting_patient(&mut ledger, &["cough"], "boston");
        ledger
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["boston"], 18, 65))
            .unwrap();

        for _ in 0..3 {
            assert_eq!(ledger.find_trials(STRANGER, &patient_id).unwrap().len(), 1);
        }
        let before = ledger.get_audit_log().len();
        let err = ledger.find_trials(STRANGER, &patient_id).unwrap_err();
        assert_eq!(err, LedgerError::RateLimited(STRANGER.to_string()));
        assert_eq!(ledger.get_audit_log().len(), before);

        clock.advance(chrono::TimeDelta::seconds(61));
        assert_eq!(ledger.find_trials(STRANGER, &patient_id).unwrap().len(), 1);
    }

    fn fixture(required: &[&str], ages: AgeRange) -> (PatientProfile, ClinicalTrial) {
        let (mut ledger, _) = test_ledger();
        let patient_id = consenting_patient(&mut ledger, &["cough", "fever"], "boston");
        let patient = ledger.get_patient(PATIENT, &patient_id).unwrap();
        let trial = ClinicalTrial {
            id: "t".to_string(),
            title: "t".to_string(),
            description: String::new(),
            required_symptoms: required.iter().map(|s| s.to_string()).collect(),
            eligible_locations: vec!["boston".to_string()],
            age_range: ages,
            eligible_genders: BTreeSet::from(Gender::ALL),
            status: TrialStatus::Active,
            sponsor_id: SPONSOR.to_string(),
            created_at: start_time(),
        };
        (patient, trial)
    }

    #[test]
    fn partial_symptom_and_demographic_fit() {
        let (patient, trial) = fixture(&["cough", "rash"], AgeRange { min: 30, max: 50 });
        // 0.4 * 0.5 + 0.3 * 1.0 + 0.3 * 0.15
        assert!((match_score(&patient, &trial) - 0.545).abs() < 1e-9);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let (patient, trial) = fixture(&["cough", "fever"], AgeRange::OPEN);
        let score = match_score(&patient, &trial);
        assert!((0.0..=1.0).contains(&score));
        assert!((score - 0.79).abs() < 1e-9);
    }

    #[test]
    fn required_fields_depend_on_restrictions() {
        let (_, mut trial) = fixture(&["cough"], AgeRange::OPEN);
        assert_eq!(required_data_fields(&trial), vec!["symptoms", "location"]);

        trial.age_range = AgeRange { min: 18, max: 65 };
        trial.eligible_genders = BTreeSet::from([Gender::Female]);
        assert_eq!(
            required_data_fields(&trial),
            vec!["symptoms", "location", "age_group", "gender"]
        );
    }
}
