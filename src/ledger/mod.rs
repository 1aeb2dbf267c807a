// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Matching Ledger
//!
//! The single owner of patient profiles, trial listings, consent state, the
//! audit trail and rate-limit counters.
//!
//! Every operation runs to completion inside one critical section (the
//! [`LedgerHandle`] write or read lock), so no caller can observe a
//! half-applied change. The only work that escapes the critical section is
//! payload anchoring, which is re-validated when its result comes back.
//!
//! ## Operation order
//!
//! Mutating operations and `find_trials` follow the same sequence:
//!
//! 1. Count the call against the caller's rate window
//! 2. Validate input and resolve the target record
//! 3. Check authorization
//! 4. Apply the change and append exactly one audit entry

mod consent;
mod handle;
mod lifecycle;
mod matching;
mod persistence;
mod rate_limit;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthorizationOracle;
use crate::clock::Clock;
use crate::crypto::{CryptoEnvelope, ProofGenerator};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    ClinicalTrial, ConsentStatus, PatientId, PatientProfile, TrialStatus, ANONYMOUS_CALLER,
};
use crate::storage::{AuditAction, AuditEntry};
use crate::store::StateStore;

pub use consent::validate_consent_transition;
pub use handle::LedgerHandle;
pub use lifecycle::validate_trial_transition;
pub use matching::{is_eligible, match_score, required_data_fields};
pub use rate_limit::{RateLimitCounter, RateLimitPolicy, RateLimiter};

/// Collaborators injected into the ledger.
pub struct LedgerDeps {
    pub envelope: Box<dyn CryptoEnvelope>,
    pub proofs: Box<dyn ProofGenerator>,
    pub oracle: Arc<dyn AuthorizationOracle>,
    pub clock: Arc<dyn Clock>,
    pub rate_limit: RateLimitPolicy,
}

/// Anchoring work handed out by `create_patient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnchor {
    pub patient_id: PatientId,
    pub payload_hash: String,
    /// Caller that created the profile; failures are attributed to it.
    pub caller_id: String,
}

/// What happened when an anchor result was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorOutcome {
    Recorded(String),
    Failed,
    /// Profile was deleted or its payload changed while anchoring ran.
    Stale,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct KeyRotationReport {
    pub key_version: u32,
    pub rotated: usize,
    pub skipped: usize,
}

/// Audit query; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub caller_id: Option<String>,
    /// Patient or trial id mentioned in the entry details.
    pub resource_id: Option<String>,
    pub action: Option<AuditAction>,
}

/// Aggregate counters for operators.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct LedgerStats {
    pub total_patients: usize,
    pub granted_consents: usize,
    pub anchored_patients: usize,
    pub total_trials: usize,
    pub active_trials: usize,
    pub audit_entries: usize,
    pub match_requests: usize,
    pub key_version: u32,
    pub envelope: String,
    pub timestamp: DateTime<Utc>,
}

pub struct Ledger {
    store: StateStore,
    rate_limiter: RateLimiter,
    envelope: Box<dyn CryptoEnvelope>,
    proofs: Box<dyn ProofGenerator>,
    oracle: Arc<dyn AuthorizationOracle>,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    /// Fresh ledger; records a `SystemInit` audit entry.
    pub fn new(deps: LedgerDeps) -> Self {
        let mut ledger = Self::from_parts(deps, StateStore::new());
        let now = ledger.clock.now();
        let details = format!(
            "ledger initialized envelope={} key_version={}",
            ledger.envelope.name(),
            ledger.envelope.key_version()
        );
        ledger
            .store
            .append_audit(now, ANONYMOUS_CALLER, AuditAction::SystemInit, details);
        ledger
    }

    fn from_parts(deps: LedgerDeps, store: StateStore) -> Self {
        Self {
            store,
            rate_limiter: RateLimiter::new(deps.rate_limit),
            envelope: deps.envelope,
            proofs: deps.proofs,
            oracle: deps.oracle,
            clock: deps.clock,
        }
    }

    /// Count one call for `caller`, failing once the window is exhausted.
    fn enforce_rate_limit(&mut self, caller: &str, now: DateTime<Utc>) -> LedgerResult<()> {
        if self.rate_limiter.check_and_increment(caller, now) {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, "Rate limit exceeded");
            Err(LedgerError::RateLimited(caller.to_string()))
        }
    }

    fn require_admin(&self, caller: &str) -> LedgerResult<()> {
        if self.oracle.is_admin(caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized(format!(
                "caller {caller} is not an admin"
            )))
        }
    }

    fn patient(&self, patient_id: &str) -> LedgerResult<&PatientProfile> {
        self.store
            .get_patient(patient_id)
            .ok_or_else(|| LedgerError::NotFound(format!("patient {patient_id}")))
    }

    fn trial(&self, trial_id: &str) -> LedgerResult<&ClinicalTrial> {
        self.store
            .get_trial(trial_id)
            .ok_or_else(|| LedgerError::NotFound(format!("trial {trial_id}")))
    }

    // ========== Reads ==========

    /// Every trial regardless of status, ordered by id.
    pub fn get_all_trials(&self) -> Vec<ClinicalTrial> {
        self.store.all_trials()
    }

    /// Full audit history, oldest first.
    pub fn get_audit_log(&self) -> Vec<AuditEntry> {
        self.store.all_audit_entries()
    }

    /// Audit entries narrowed by `filter`, oldest first.
    ///
    /// Admins see the whole trail. Any other caller is scoped to the entries
    /// it made itself, and naming another caller is refused.
    pub fn query_audit(&self, caller: &str, filter: &AuditFilter) -> LedgerResult<Vec<AuditEntry>> {
        let mut filter = filter.clone();
        if !self.oracle.is_admin(caller) {
            match filter.caller_id.as_deref() {
                Some(requested) if requested != caller => {
                    return Err(LedgerError::Unauthorized(format!(
                        "caller {caller} may only read its own audit entries"
                    )));
                }
                _ => filter.caller_id = Some(caller.to_string()),
            }
        }

        let audit = self.store.audit();
        let mut entries = match (&filter.caller_id, &filter.resource_id) {
            (Some(caller_id), _) => audit.search_by_caller(caller_id),
            (None, Some(resource_id)) => audit.search_by_resource(resource_id),
            (None, None) => audit.entries().to_vec(),
        };
        if let (Some(_), Some(resource_id)) = (&filter.caller_id, &filter.resource_id) {
            entries.retain(|e| e.details.contains(resource_id.as_str()));
        }
        if let Some(action) = filter.action {
            entries.retain(|e| e.action == action);
        }
        Ok(entries)
    }

    pub fn stats(&self) -> LedgerStats {
        let patients: Vec<&PatientProfile> = self.store.patients().collect();
        LedgerStats {
            total_patients: patients.len(),
            granted_consents: patients
                .iter()
                .filter(|p| p.consent == ConsentStatus::Granted)
                .count(),
            anchored_patients: patients.iter().filter(|p| p.anchor_ref.is_some()).count(),
            total_trials: self.store.trial_count(),
            active_trials: self
                .store
                .trials()
                .filter(|t| t.status == TrialStatus::Active)
                .count(),
            audit_entries: self.store.audit().len(),
            match_requests: self.store.audit().count(AuditAction::MatchRequested),
            key_version: self.envelope.key_version(),
            envelope: self.envelope.name().to_string(),
            timestamp: self.clock.now(),
        }
    }

    pub fn key_version(&self) -> u32 {
        self.envelope.key_version()
    }

    /// Drop rate-limit counters whose window has passed.
    pub fn prune_rate_limits(&mut self) -> usize {
        let now = self.clock.now();
        self.rate_limiter.prune_expired(now)
    }
}
