// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory state store owned by the ledger.
//!
//! Holds patients, trials and the audit trail. Each method either applies
//! fully or leaves the maps untouched; the ledger's single write lock makes
//! every call one critical section. Lookups hand out clones, never
//! references that outlive the lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{ClinicalTrial, PatientId, PatientProfile, TrialId};
use crate::storage::{AuditAction, AuditEntry, AuditLog};

#[derive(Debug, Default)]
pub struct StateStore {
    patients: HashMap<PatientId, PatientProfile>,
    trials: HashMap<TrialId, ClinicalTrial>,
    audit: AuditLog,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            patients: HashMap::new(),
            trials: HashMap::new(),
            audit: AuditLog::new(),
        }
    }

    /// Rebuild a store from recovered records.
    pub fn from_parts(
        patients: Vec<PatientProfile>,
        trials: Vec<ClinicalTrial>,
        audit: AuditLog,
    ) -> Self {
        Self {
            patients: patients.into_iter().map(|p| (p.id.clone(), p)).collect(),
            trials: trials.into_iter().map(|t| (t.id.clone(), t)).collect(),
            audit,
        }
    }

    // ========== Patients ==========

    pub fn get_patient(&self, patient_id: &str) -> Option<&PatientProfile> {
        self.patients.get(patient_id)
    }

    pub fn get_patient_mut(&mut self, patient_id: &str) -> Option<&mut PatientProfile> {
        self.patients.get_mut(patient_id)
    }

    pub fn put_patient(&mut self, patient: PatientProfile) {
        self.patients.insert(patient.id.clone(), patient);
    }

    pub fn remove_patient(&mut self, patient_id: &str) -> Option<PatientProfile> {
        self.patients.remove(patient_id)
    }

    pub fn patients(&self) -> impl Iterator<Item = &PatientProfile> {
        self.patients.values()
    }

    /// Patient ids in ascending order.
    pub fn patient_ids(&self) -> Vec<PatientId> {
        let mut ids: Vec<PatientId> = self.patients.keys().cloned().collect();
        ids.sort();
        ids
    }

    // ========== Trials ==========

    pub fn get_trial(&self, trial_id: &str) -> Option<&ClinicalTrial> {
        self.trials.get(trial_id)
    }

    pub fn get_trial_mut(&mut self, trial_id: &str) -> Option<&mut ClinicalTrial> {
        self.trials.get_mut(trial_id)
    }

    pub fn put_trial(&mut self, trial: ClinicalTrial) {
        self.trials.insert(trial.id.clone(), trial);
    }

    pub fn trials(&self) -> impl Iterator<Item = &ClinicalTrial> {
        self.trials.values()
    }

    /// Snapshot of every trial, ordered by id.
    pub fn all_trials(&self) -> Vec<ClinicalTrial> {
        let mut trials: Vec<ClinicalTrial> = self.trials.values().cloned().collect();
        trials.sort_by(|a, b| a.id.cmp(&b.id));
        trials
    }

    pub fn trial_count(&self) -> usize {
        self.trials.len()
    }

    // ========== Audit ==========

    pub fn append_audit(
        &mut self,
        timestamp: DateTime<Utc>,
        caller_id: impl Into<String>,
        action: AuditAction,
        details: impl Into<String>,
    ) -> &AuditEntry {
        self.audit.append(timestamp, caller_id, action, details)
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Snapshot of the full audit history (oldest first).
    pub fn all_audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries().to_vec()
    }
}
