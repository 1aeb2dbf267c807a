// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! On-disk layout under `LEDGER_DATA_DIR`.
//!
//! ```text
//! <root>/
//!   ledger/
//!     snapshot.redb
//! ```

use std::path::{Path, PathBuf};

/// Default data directory. Mount it on encrypted storage in production.
pub const DATA_ROOT: &str = "/data";

const LEDGER_DIR: &str = "ledger";
const SNAPSHOT_FILE: &str = "snapshot.redb";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The redb file holding one table per stable buffer.
    pub fn snapshot_db(&self) -> PathBuf {
        self.root.join(LEDGER_DIR).join(SNAPSHOT_FILE)
    }
}
