// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Carrying ledger state across restarts.
//!
//! `pre_upgrade` serializes every record on its own; `post_upgrade` decodes
//! them one by one, so a corrupt record costs only itself. Each dropped
//! record is reported by a `SystemError` audit entry once the rest of the
//! state is back.

use super::{Ledger, LedgerDeps, RateLimitCounter};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{ClinicalTrial, PatientProfile, ANONYMOUS_CALLER};
use crate::storage::{
    decode_record, encode_record, AuditAction, AuditEntry, AuditLog, DroppedRecord,
    RecoveryReport, StableBuffers,
};
use crate::store::StateStore;

fn encode<T: serde::Serialize>(store: &str, key: &str, record: &T) -> LedgerResult<Vec<u8>> {
    encode_record(record)
        .map_err(|e| LedgerError::SystemError(format!("failed to encode {store} record {key}: {e}")))
}

impl Ledger {
    /// Serialize the full state into stable buffers.
    pub fn pre_upgrade(&self) -> LedgerResult<StableBuffers> {
        let mut buffers = StableBuffers {
            key_version: Some(self.envelope.key_version()),
            ..Default::default()
        };

        for patient_id in self.store.patient_ids() {
            if let Some(patient) = self.store.get_patient(&patient_id) {
                let bytes = encode("patients", &patient_id, patient)?;
                buffers.patients.push((patient_id, bytes));
            }
        }
        for trial in self.store.all_trials() {
            let bytes = encode("trials", &trial.id, &trial)?;
            buffers.trials.push((trial.id, bytes));
        }
        for entry in self.store.audit().entries() {
            let bytes = encode("audit", &entry.sequence.to_string(), entry)?;
            buffers.audit.push((entry.sequence, bytes));
        }
        let mut counters: Vec<_> = self.rate_limiter.counters().collect();
        counters.sort_by(|a, b| a.0.cmp(b.0));
        for (caller, counter) in counters {
            let bytes = encode("rate_limits", caller, counter)?;
            buffers.rate_limits.push((caller.clone(), bytes));
        }

        tracing::debug!(records = buffers.record_count(), "Ledger state serialized");
        Ok(buffers)
    }

    /// Rebuild a ledger from stable buffers, leaving them empty.
    ///
    /// Records that fail to decode, or whose key disagrees with their
    /// content, are dropped and audited. No `SystemInit` entry is written.
    pub fn post_upgrade(
        buffers: &mut StableBuffers,
        mut deps: LedgerDeps,
    ) -> LedgerResult<(Ledger, RecoveryReport)> {
        let taken = buffers.drain();
        let mut dropped: Vec<DroppedRecord> = Vec::new();

        let mut patients = Vec::with_capacity(taken.patients.len());
        for (key, bytes) in taken.patients {
            match decode_record::<PatientProfile>(&bytes) {
                Ok(p) if p.id == key => patients.push(p),
                Ok(p) => dropped.push(DroppedRecord {
                    store: "patients",
                    key,
                    reason: format!("record id {} does not match its key", p.id),
                }),
                Err(e) => dropped.push(DroppedRecord {
                    store: "patients",
                    key,
                    reason: e.to_string(),
                }),
            }
        }

        let mut trials = Vec::with_capacity(taken.trials.len());
        for (key, bytes) in taken.trials {
            match decode_record::<ClinicalTrial>(&bytes) {
                Ok(t) if t.id == key => trials.push(t),
                Ok(t) => dropped.push(DroppedRecord {
                    store: "trials",
                    key,
                    reason: format!("record id {} does not match its key", t.id),
                }),
                Err(e) => dropped.push(DroppedRecord {
                    store: "trials",
                    key,
                    reason: e.to_string(),
                }),
            }
        }

        let mut entries = Vec::with_capacity(taken.audit.len());
        for (sequence, bytes) in taken.audit {
            match decode_record::<AuditEntry>(&bytes) {
                Ok(e) if e.sequence == sequence => entries.push(e),
                Ok(e) => dropped.push(DroppedRecord {
                    store: "audit",
                    key: sequence.to_string(),
                    reason: format!("entry sequence {} does not match its key", e.sequence),
                }),
                Err(e) => dropped.push(DroppedRecord {
                    store: "audit",
                    key: sequence.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        let mut counters = Vec::with_capacity(taken.rate_limits.len());
        for (caller, bytes) in taken.rate_limits {
            match decode_record::<RateLimitCounter>(&bytes) {
                Ok(c) => counters.push((caller, c)),
                Err(e) => dropped.push(DroppedRecord {
                    store: "rate_limits",
                    key: caller,
                    reason: e.to_string(),
                }),
            }
        }

        if let Some(version) = taken.key_version {
            deps.envelope.resume_at(version)?;
        }

        let report = RecoveryReport {
            patients: patients.len(),
            trials: trials.len(),
            audit_entries: entries.len(),
            rate_limits: counters.len(),
            dropped: dropped.clone(),
        };

        let store = StateStore::from_parts(patients, trials, AuditLog::from_entries(entries));
        let mut ledger = Ledger::from_parts(deps, store);
        for (caller, counter) in counters {
            ledger.rate_limiter.restore(caller, counter);
        }

        let now = ledger.clock.now();
        for record in &dropped {
            tracing::warn!(store = record.store, key = %record.key, reason = %record.reason, "Dropped corrupt record during recovery");
            ledger.store.append_audit(
                now,
                ANONYMOUS_CALLER,
                AuditAction::SystemError,
                format!(
                    "recovery dropped {} record {}: {}",
                    record.store, record.key, record.reason
                ),
            );
        }

        tracing::info!(
            patients = report.patients,
            trials = report.trials,
            audit_entries = report.audit_entries,
            dropped = report.dropped.len(),
            "Ledger state restored"
        );
        Ok((ledger, report))
    }

    /// Restore from `buffers` when they hold a snapshot, otherwise start fresh.
    pub fn restore_or_init(
        buffers: &mut StableBuffers,
        deps: LedgerDeps,
    ) -> LedgerResult<(Ledger, Option<RecoveryReport>)> {
        if buffers.is_empty() {
            Ok((Ledger::new(deps), None))
        } else {
            let (ledger, report) = Ledger::post_upgrade(buffers, deps)?;
            Ok((ledger, Some(report)))
        }
    }
}
