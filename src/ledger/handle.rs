// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared async handle to the ledger.
//!
//! Writers take the lock exclusively for the whole operation; reads share
//! it. Anchoring runs on tracked background tasks that take the write lock
//! again only to apply their result.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;

use super::{AuditFilter, KeyRotationReport, Ledger, LedgerStats, PendingAnchor};
use crate::anchor::{AnchorError, AnchorService};
use crate::error::LedgerResult;
use crate::models::{
    AddTrialRequest, ClinicalTrial, ConsentStatus, CreatePatientRequest, CreatePatientResponse,
    MatchResult, PatientProfile, SensitiveDataResponse, TrialId, TrialStatus,
};
use crate::storage::{AuditEntry, StableBuffers};

#[derive(Clone)]
pub struct LedgerHandle {
    inner: Arc<RwLock<Ledger>>,
    anchor: Arc<dyn AnchorService>,
    anchor_timeout: Duration,
    anchors: TaskTracker,
}

impl LedgerHandle {
    pub fn new(ledger: Ledger, anchor: Arc<dyn AnchorService>, anchor_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
            anchor,
            anchor_timeout,
            anchors: TaskTracker::new(),
        }
    }

    /// Create a profile and start anchoring its payload hash.
    ///
    /// Returns as soon as the profile is stored.
    pub async fn create_patient(
        &self,
        caller: &str,
        request: CreatePatientRequest,
    ) -> LedgerResult<CreatePatientResponse> {
        let pending = self.inner.write().await.create_patient(caller, request)?;
        let response = CreatePatientResponse {
            patient_id: pending.patient_id.clone(),
            payload_hash: pending.payload_hash.clone(),
        };
        self.spawn_anchor(pending);
        Ok(response)
    }

    fn spawn_anchor(&self, pending: PendingAnchor) {
        let inner = Arc::clone(&self.inner);
        let anchor = Arc::clone(&self.anchor);
        let timeout = self.anchor_timeout;

        self.anchors.spawn(async move {
            let result = match tokio::time::timeout(
                timeout,
                anchor.anchor(&pending.patient_id, &pending.payload_hash),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AnchorError::Timeout(timeout)),
            };
            inner.write().await.complete_anchor(&pending, result);
        });
    }

    /// Wait for every in-flight anchoring task to finish.
    pub async fn settle_anchors(&self) {
        self.anchors.close();
        self.anchors.wait().await;
        self.anchors.reopen();
    }

    pub fn pending_anchors(&self) -> usize {
        self.anchors.len()
    }

    pub fn anchor_service(&self) -> &'static str {
        self.anchor.name()
    }

    pub async fn find_trials(&self, caller: &str, patient_id: &str) -> LedgerResult<Vec<MatchResult>> {
        self.inner.write().await.find_trials(caller, patient_id)
    }

    pub async fn update_consent(
        &self,
        caller: &str,
        patient_id: &str,
        consent: ConsentStatus,
    ) -> LedgerResult<ConsentStatus> {
        self.inner
            .write()
            .await
            .update_consent(caller, patient_id, consent)
    }

    pub async fn delete_patient_data(&self, caller: &str, patient_id: &str) -> LedgerResult<()> {
        self.inner.write().await.delete_patient_data(caller, patient_id)
    }

    pub async fn add_clinical_trial(
        &self,
        caller: &str,
        request: AddTrialRequest,
    ) -> LedgerResult<TrialId> {
        self.inner.write().await.add_clinical_trial(caller, request)
    }

    pub async fn update_trial_status(
        &self,
        caller: &str,
        trial_id: &str,
        status: TrialStatus,
    ) -> LedgerResult<TrialStatus> {
        self.inner
            .write()
            .await
            .update_trial_status(caller, trial_id, status)
    }

    pub async fn rotate_encryption_key(&self, caller: &str) -> LedgerResult<KeyRotationReport> {
        self.inner.write().await.rotate_encryption_key(caller)
    }

    pub async fn get_patient(&self, caller: &str, patient_id: &str) -> LedgerResult<PatientProfile> {
        self.inner.read().await.get_patient(caller, patient_id)
    }

    pub async fn read_sensitive_data(
        &self,
        caller: &str,
        patient_id: &str,
    ) -> LedgerResult<SensitiveDataResponse> {
        self.inner.read().await.read_sensitive_data(caller, patient_id)
    }

    pub async fn get_all_trials(&self) -> Vec<ClinicalTrial> {
        self.inner.read().await.get_all_trials()
    }

    pub async fn get_audit_log(&self) -> Vec<AuditEntry> {
        self.inner.read().await.get_audit_log()
    }

    pub async fn query_audit(
        &self,
        caller: &str,
        filter: AuditFilter,
    ) -> LedgerResult<Vec<AuditEntry>> {
        self.inner.read().await.query_audit(caller, &filter)
    }

    pub async fn stats(&self) -> LedgerStats {
        self.inner.read().await.stats()
    }

    /// Serialize current state for a checkpoint.
    pub async fn snapshot(&self) -> LedgerResult<StableBuffers> {
        let mut ledger = self.inner.write().await;
        ledger.prune_rate_limits();
        ledger.pre_upgrade()
    }

    /// Whether the lock can be taken for reading right now.
    pub fn is_responsive(&self) -> bool {
        self.inner.try_read().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::anchor::SimulatedAnchorService;
    use crate::models::AgeGroup;
    use crate::storage::AuditAction;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn handle_with(anchor: Arc<dyn AnchorService>, timeout: Duration) -> LedgerHandle {
        let (ledger, _) = test_ledger();
        LedgerHandle::new(ledger, anchor, timeout)
    }

    struct FailingAnchor;

    #[async_trait]
    impl AnchorService for FailingAnchor {
        async fn anchor(&self, _: &str, _: &str) -> Result<String, AnchorError> {
            Err(AnchorError::Rejected("503 Service Unavailable".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct SlowAnchor;

    #[async_trait]
    impl AnchorService for SlowAnchor {
        async fn anchor(&self, _: &str, _: &str) -> Result<String, AnchorError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too-late".to_string())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    /// Holds every anchor call until released.
    struct GatedAnchor {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl AnchorService for GatedAnchor {
        async fn anchor(&self, _: &str, payload_hash: &str) -> Result<String, AnchorError> {
            self.gate.notified().await;
            Ok(format!("gated_{payload_hash}"))
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn create_patient_is_anchored_in_background() {
        let handle = handle_with(Arc::new(SimulatedAnchorService), Duration::from_secs(5));
        let created = handle
            .create_patient(PATIENT, patient_request(&["cough"], "boston", AgeGroup::Adult))
            .await
            .unwrap();

        handle.settle_anchors().await;

        let patient = handle.get_patient(PATIENT, &created.patient_id).await.unwrap();
        let expected = format!("sim_anchor_{}", &created.payload_hash[..16]);
        assert_eq!(patient.anchor_ref, Some(expected));
        assert_eq!(handle.stats().await.anchored_patients, 1);
    }

    #[tokio::test]
    async fn anchor_failure_keeps_profile_and_audits() {
        let handle = handle_with(Arc::new(FailingAnchor), Duration::from_secs(5));
        let created = handle
            .create_patient(PATIENT, patient_request(&["cough"], "boston", AgeGroup::Adult))
            .await
            .unwrap();
        handle.settle_anchors().await;

        let patient = handle.get_patient(PATIENT, &created.patient_id).await.unwrap();
        assert!(patient.anchor_ref.is_none());

        let log = handle.get_audit_log().await;
        let last = log.last().unwrap();
        assert_eq!(last.action, AuditAction::SystemError);
        assert_eq!(last.caller_id, PATIENT);
    }

    #[tokio::test]
    async fn anchor_timeout_is_reported() {
        let handle = handle_with(Arc::new(SlowAnchor), Duration::from_millis(20));
        let created = handle
            .create_patient(PATIENT, patient_request(&["cough"], "boston", AgeGroup::Adult))
            .await
            .unwrap();
        handle.settle_anchors().await;

        let patient = handle.get_patient(PATIENT, &created.patient_id).await.unwrap();
        assert!(patient.anchor_ref.is_none());
        let log = handle.get_audit_log().await;
        assert!(log.last().unwrap().details.contains("timed out"));
    }

    #[tokio::test]
    async fn deletion_during_anchoring_wins() {
        let gate = Arc::new(Notify::new());
        let handle = handle_with(
            Arc::new(GatedAnchor { gate: gate.clone() }),
            Duration::from_secs(5),
        );
        let created = handle
            .create_patient(PATIENT, patient_request(&["cough"], "boston", AgeGroup::Adult))
            .await
            .unwrap();
        assert_eq!(handle.pending_anchors(), 1);

        handle
            .delete_patient_data(PATIENT, &created.patient_id)
            .await
            .unwrap();
        let audit_before = handle.get_audit_log().await.len();

        gate.notify_one();
        handle.settle_anchors().await;

        assert!(handle.get_patient(PATIENT, &created.patient_id).await.is_err());
        assert_eq!(handle.get_audit_log().await.len(), audit_before);
        assert_eq!(handle.pending_anchors(), 0);
    }

    #[tokio::test]
    async fn concurrent_creates_all_land() {
        let handle = handle_with(Arc::new(SimulatedAnchorService), Duration::from_secs(5));

        let mut tasks = Vec::new();
        for i in 0..20 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let caller = format!("patient_{i}");
                handle
                    .create_patient(&caller, patient_request(&["cough"], "boston", AgeGroup::Adult))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        handle.settle_anchors().await;

        let stats = handle.stats().await;
        assert_eq!(stats.total_patients, 20);
        assert_eq!(stats.anchored_patients, 20);

        let log = handle.get_audit_log().await;
        let sequences: Vec<u64> = log.iter().map(|e| e.sequence).collect();
        let expected: Vec<u64> = (1..=log.len() as u64).collect();
        assert_eq!(sequences, expected);
    }

    #[tokio::test]
    async fn snapshot_captures_state() {
        let handle = handle_with(Arc::new(SimulatedAnchorService), Duration::from_secs(5));
        handle
            .add_clinical_trial(SPONSOR, trial_request(&["cough"], &["boston"], 18, 65))
            .await
            .unwrap();

        let buffers = handle.snapshot().await.unwrap();
        assert_eq!(buffers.trials.len(), 1);
        assert_eq!(buffers.key_version, Some(1));
        assert!(handle.is_responsive());
    }
}
