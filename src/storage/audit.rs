// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Append-only audit trail.
//!
//! Every mutating ledger operation appends exactly one entry on success.
//! Entries are never edited or removed, including after the patient they
//! reference has been deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Patient events
    PatientCreated,
    DataDeleted,
    ConsentUpdated,

    // Trial events
    TrialAdded,
    TrialStatusUpdated,

    // Matching
    MatchRequested,

    // Key management
    KeyRotated,

    // System events
    SystemInit,
    SystemError,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct AuditEntry {
    /// Position in the log, starting at 1.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// Authenticated caller, or `anonymous` for system-internal events.
    pub caller_id: String,
    pub action: AuditAction,
    pub details: String,
}

/// Ordered, append-only audit history (oldest first).
#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    next_sequence: u64,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_sequence: 1,
        }
    }

    /// Rebuild a log from recovered entries, ordered by sequence.
    pub fn from_entries(mut entries: Vec<AuditEntry>) -> Self {
        entries.sort_by_key(|e| e.sequence);
        let next_sequence = entries.last().map(|e| e.sequence + 1).unwrap_or(1);
        Self {
            entries,
            next_sequence,
        }
    }

    /// Append a new entry.
    pub fn append(
        &mut self,
        timestamp: DateTime<Utc>,
        caller_id: impl Into<String>,
        action: AuditAction,
        details: impl Into<String>,
    ) -> &AuditEntry {
        let entry = AuditEntry {
            sequence: self.next_sequence,
            timestamp,
            caller_id: caller_id.into(),
            action,
            details: details.into(),
        };
        self.next_sequence += 1;
        tracing::debug!(
            sequence = entry.sequence,
            action = ?entry.action,
            caller = %entry.caller_id,
            "Audit entry appended"
        );
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, action: AuditAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    /// Entries recorded for one caller.
    pub fn search_by_caller(&self, caller_id: &str) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.caller_id == caller_id)
            .cloned()
            .collect()
    }

    /// Entries whose details mention a resource id.
    pub fn search_by_resource(&self, resource_id: &str) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.details.contains(resource_id))
            .cloned()
            .collect()
    }
}
