// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stable representation of ledger state across restarts.
//!
//! Each record is serialized on its own so that one corrupt record can be
//! dropped during recovery without losing the rest of its store.

use serde::{de::DeserializeOwned, Serialize};

/// Current layout of [`StableBuffers`] records.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Serialized stores, one JSON document per record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StableBuffers {
    /// patient id → profile
    pub patients: Vec<(String, Vec<u8>)>,
    /// trial id → trial
    pub trials: Vec<(String, Vec<u8>)>,
    /// sequence → audit entry
    pub audit: Vec<(u64, Vec<u8>)>,
    /// caller id → rate-limit counter
    pub rate_limits: Vec<(String, Vec<u8>)>,
    /// Envelope key version in force when the snapshot was taken.
    pub key_version: Option<u32>,
}

impl StableBuffers {
    /// True when no state has been captured (fresh deployment).
    pub fn is_empty(&self) -> bool {
        self.key_version.is_none()
            && self.patients.is_empty()
            && self.trials.is_empty()
            && self.audit.is_empty()
            && self.rate_limits.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.patients.len() + self.trials.len() + self.audit.len() + self.rate_limits.len()
    }

    /// Move the contents out, leaving the buffers empty.
    pub fn drain(&mut self) -> StableBuffers {
        std::mem::take(self)
    }
}

pub fn encode_record<T: Serialize>(record: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(record)
}

pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// A record discarded during recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRecord {
    pub store: &'static str,
    pub key: String,
    pub reason: String,
}

/// Outcome of restoring a ledger from [`StableBuffers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub patients: usize,
    pub trials: usize,
    pub audit_entries: usize,
    pub rate_limits: usize,
    pub dropped: Vec<DroppedRecord>,
}
