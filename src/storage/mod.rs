// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Storage
//!
//! Audit trail, access checks and restart snapshots for the ledger.
//!
//! Live state is held in memory by the ledger actor. Across restarts it is
//! carried by [`StableBuffers`], which are written to a redb file under the
//! data directory.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   ledger/
//!     snapshot.redb   # patients, trials, audit, rate_limits, meta
//! ```
//!
//! ## Important Notes
//!
//! - Sensitive payloads are sealed by the crypto envelope before they reach
//!   any store; snapshots only ever contain ciphertext.
//! - Snapshot records are serialized one by one so recovery can drop a
//!   corrupt record without discarding its neighbours.

pub mod audit;
pub mod ownership;
pub mod paths;
pub mod snapshot;
pub mod snapshot_db;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use ownership::{OwnedResource, OwnershipEnforcer};
pub use paths::StoragePaths;
pub use snapshot::{
    decode_record, encode_record, DroppedRecord, RecoveryReport, StableBuffers,
    SNAPSHOT_FORMAT_VERSION,
};
pub use snapshot_db::{SnapshotDb, SnapshotDbError, SnapshotDbResult};
