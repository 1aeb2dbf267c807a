// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Snapshot Checkpointer
//!
//! Background task that periodically writes the ledger's stable buffers to
//! the redb snapshot database, so a crash loses at most one interval of
//! state. The final snapshot on shutdown is taken by `main` after the server
//! has drained.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`; the loop exits between
//! checkpoints and never interrupts a write in progress.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::LedgerResult;
use crate::ledger::LedgerHandle;
use crate::storage::SnapshotDb;

pub struct Checkpointer {
    ledger: LedgerHandle,
    db: Arc<SnapshotDb>,
    interval: Duration,
}

impl Checkpointer {
    pub fn new(ledger: LedgerHandle, db: Arc<SnapshotDb>, interval: Duration) -> Self {
        Self {
            ledger,
            db,
            interval,
        }
    }

    /// Run the checkpoint loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(checkpointer.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Snapshot checkpointer starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Snapshot checkpointer shutting down");
                    return;
                }
            }

            if let Err(e) = self.checkpoint_once().await {
                warn!(error = %e, "Checkpoint failed");
            }
        }
    }

    /// Take one snapshot and persist it. Returns the number of records written.
    pub async fn checkpoint_once(&self) -> LedgerResult<usize> {
        let buffers = self.ledger.snapshot().await?;
        let records = buffers.record_count();
        self.db.save(&buffers)?;
        debug!(records, "Checkpoint written");
        Ok(records)
    }
}
