// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded snapshot database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `patients`: patient_id → serialized PatientProfile
//! - `trials`: trial_id → serialized ClinicalTrial
//! - `audit`: sequence → serialized AuditEntry
//! - `rate_limits`: caller_id → serialized RateLimitCounter
//! - `meta`: key → value (`key_version`, `format_version`)

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::snapshot::{StableBuffers, SNAPSHOT_FORMAT_VERSION};

// =============================================================================
// Table Definitions
// =============================================================================

const PATIENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("patients");

const TRIALS: TableDefinition<&str, &[u8]> = TableDefinition::new("trials");

const AUDIT: TableDefinition<u64, &[u8]> = TableDefinition::new("audit");

const RATE_LIMITS: TableDefinition<&str, &[u8]> = TableDefinition::new("rate_limits");

/// Metadata: key → u32 big-endian bytes.
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const META_KEY_VERSION: &str = "key_version";
const META_FORMAT_VERSION: &str = "format_version";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SnapshotDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported snapshot format version {0}")]
    UnsupportedFormat(u32),
}

pub type SnapshotDbResult<T> = Result<T, SnapshotDbError>;

fn decode_u32(bytes: &[u8]) -> Option<u32> {
    bytes.get(..4)?.try_into().ok().map(u32::from_be_bytes)
}

// =============================================================================
// SnapshotDb
// =============================================================================

/// Durable home for [`StableBuffers`] between process lifetimes.
pub struct SnapshotDb {
    db: Database,
}

impl SnapshotDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> SnapshotDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PATIENTS)?;
            let _ = write_txn.open_table(TRIALS)?;
            let _ = write_txn.open_table(AUDIT)?;
            let _ = write_txn.open_table(RATE_LIMITS)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Replace the stored snapshot with `buffers` in one write transaction.
    pub fn save(&self, buffers: &StableBuffers) -> SnapshotDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.delete_table(PATIENTS)?;
            write_txn.delete_table(TRIALS)?;
            write_txn.delete_table(AUDIT)?;
            write_txn.delete_table(RATE_LIMITS)?;
            write_txn.delete_table(META)?;

            let mut patients = write_txn.open_table(PATIENTS)?;
            for (id, bytes) in &buffers.patients {
                patients.insert(id.as_str(), bytes.as_slice())?;
            }

            let mut trials = write_txn.open_table(TRIALS)?;
            for (id, bytes) in &buffers.trials {
                trials.insert(id.as_str(), bytes.as_slice())?;
            }

            let mut audit = write_txn.open_table(AUDIT)?;
            for (sequence, bytes) in &buffers.audit {
                audit.insert(*sequence, bytes.as_slice())?;
            }

            let mut rate_limits = write_txn.open_table(RATE_LIMITS)?;
            for (caller, bytes) in &buffers.rate_limits {
                rate_limits.insert(caller.as_str(), bytes.as_slice())?;
            }

            let mut meta = write_txn.open_table(META)?;
            meta.insert(
                META_FORMAT_VERSION,
                SNAPSHOT_FORMAT_VERSION.to_be_bytes().as_slice(),
            )?;
            if let Some(version) = buffers.key_version {
                meta.insert(META_KEY_VERSION, version.to_be_bytes().as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Read the stored snapshot. Returns empty buffers when nothing was saved.
    pub fn load(&self) -> SnapshotDbResult<StableBuffers> {
        let read_txn = self.db.begin_read()?;

        let meta = read_txn.open_table(META)?;
        if let Some(format) = meta.get(META_FORMAT_VERSION)? {
            let format = decode_u32(format.value()).unwrap_or(0);
            if format != SNAPSHOT_FORMAT_VERSION {
                return Err(SnapshotDbError::UnsupportedFormat(format));
            }
        }
        let key_version = match meta.get(META_KEY_VERSION)? {
            Some(v) => decode_u32(v.value()),
            None => None,
        };

        let mut buffers = StableBuffers {
            key_version,
            ..Default::default()
        };

        let patients = read_txn.open_table(PATIENTS)?;
        for entry in patients.iter()? {
            let (k, v) = entry?;
            buffers
                .patients
                .push((k.value().to_string(), v.value().to_vec()));
        }

        let trials = read_txn.open_table(TRIALS)?;
        for entry in trials.iter()? {
            let (k, v) = entry?;
            buffers.trials.push((k.value().to_string(), v.value().to_vec()));
        }

        let audit = read_txn.open_table(AUDIT)?;
        for entry in audit.iter()? {
            let (k, v) = entry?;
            buffers.audit.push((k.value(), v.value().to_vec()));
        }

        let rate_limits = read_txn.open_table(RATE_LIMITS)?;
        for entry in rate_limits.iter()? {
            let (k, v) = entry?;
            buffers
                .rate_limits
                .push((k.value().to_string(), v.value().to_vec()));
        }

        Ok(buffers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_db() -> (SnapshotDb, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = SnapshotDb::open(&dir.path().join("ledger").join("snapshot.redb")).unwrap();
        (db, dir)
    }

    fn sample_buffers() -> StableBuffers {
        StableBuffers {
            patients: vec![
                ("p1".into(), br#"{"id":"p1"}"#.to_vec()),
                ("p2".into(), br#"{"id":"p2"}"#.to_vec()),
            ],
            trials: vec![("t1".into(), br#"{"id":"t1"}"#.to_vec())],
            audit: vec![(1, b"a".to_vec()), (2, b"b".to_vec()), (10, b"c".to_vec())],
            rate_limits: vec![("caller".into(), b"{}".to_vec())],
            key_version: Some(3),
        }
    }

    #[test]
    fn fresh_database_loads_empty() {
        let (db, _dir) = temp_db();
        assert!(db.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_preserves_records() {
        let (db, _dir) = temp_db();
        let buffers = sample_buffers();
        db.save(&buffers).unwrap();

        let loaded = db.load().unwrap();
        assert_eq!(loaded, buffers);
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let (db, _dir) = temp_db();
        db.save(&sample_buffers()).unwrap();

        let smaller = StableBuffers {
            trials: vec![("t9".into(), b"{}".to_vec())],
            key_version: Some(1),
            ..Default::default()
        };
        db.save(&smaller).unwrap();

        assert_eq!(db.load().unwrap(), smaller);
    }

    #[test]
    fn saving_empty_buffers_empties_all_tables() {
        let (db, _dir) = temp_db();
        db.save(&sample_buffers()).unwrap();
        db.save(&StableBuffers::default()).unwrap();
        assert!(db.load().unwrap().is_empty());
    }

    #[test]
    fn reopen_sees_committed_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.redb");
        {
            let db = SnapshotDb::open(&path).unwrap();
            db.save(&sample_buffers()).unwrap();
        }
        let db = SnapshotDb::open(&path).unwrap();
        assert_eq!(db.load().unwrap().key_version, Some(3));
    }
}
