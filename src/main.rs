// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trial_match_ledger::{
    anchor::{AnchorService, HttpAnchorService, SimulatedAnchorService},
    api::router,
    auth::{AuthorizationOracle, StaticRoleOracle},
    checkpoint::Checkpointer,
    clock::SystemClock,
    config::{LedgerConfig, LogFormat},
    crypto::{AeadEnvelope, CryptoEnvelope, HmacProofGenerator, PlaceholderEnvelope},
    ledger::{Ledger, LedgerDeps, LedgerHandle},
    state::{AppState, AuthConfig},
    storage::{SnapshotDb, StoragePaths},
};

/// Seed for the non-confidential envelope used when no master key is set.
const PLACEHOLDER_SEED: &[u8] = b"trial-ledger-placeholder";

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match LedgerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);
    config.log_warnings();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!(%message, "Trial match ledger stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: LedgerConfig) -> Result<(), String> {
    let envelope: Box<dyn CryptoEnvelope> = match &config.master_key {
        Some(key) => Box::new(
            AeadEnvelope::new(key).map_err(|e| format!("master key rejected: {e}"))?,
        ),
        None => {
            warn!("LEDGER_MASTER_KEY not set; payloads use the placeholder envelope and are NOT confidential");
            Box::new(PlaceholderEnvelope::new(PLACEHOLDER_SEED))
        }
    };

    let roles = StaticRoleOracle::new(config.admin_ids.clone(), config.sponsor_ids.clone());
    info!(
        admins = roles.admin_count(),
        sponsors = roles.sponsor_count(),
        "Role oracle configured"
    );
    let oracle: Arc<dyn AuthorizationOracle> = Arc::new(roles);

    let anchor: Arc<dyn AnchorService> = match &config.anchor_url {
        Some(url) => Arc::new(
            HttpAnchorService::new(url.clone(), config.anchor_timeout)
                .map_err(|e| format!("anchor client: {e}"))?,
        ),
        None => {
            info!("ANCHOR_URL not set; using the simulated anchor service");
            Arc::new(SimulatedAnchorService)
        }
    };

    let paths = StoragePaths::new(&config.data_dir);
    info!(data_dir = %paths.root().display(), "Opening snapshot database");
    let db = Arc::new(
        SnapshotDb::open(&paths.snapshot_db()).map_err(|e| format!("snapshot database: {e}"))?,
    );
    let mut buffers = db.load().map_err(|e| format!("snapshot load: {e}"))?;

    let deps = LedgerDeps {
        envelope,
        proofs: Box::new(HmacProofGenerator::new(config.proof_secret.as_bytes())),
        oracle: oracle.clone(),
        clock: Arc::new(SystemClock),
        rate_limit: config.rate_limit_policy(),
    };
    let (ledger, recovery) =
        Ledger::restore_or_init(&mut buffers, deps).map_err(|e| format!("ledger restore: {e}"))?;
    if let Some(report) = recovery {
        if !report.dropped.is_empty() {
            warn!(dropped = report.dropped.len(), "Snapshot records were dropped during restore");
        }
    }

    let handle = LedgerHandle::new(ledger, anchor, config.anchor_timeout);
    let state = AppState::new(handle.clone(), oracle)
        .with_auth_config(AuthConfig {
            jwt_secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
        })
        .with_data_dir(config.data_dir.clone());
    if config.jwt_secret.is_none() {
        warn!("JWT_SECRET not set; bearer tokens are only accepted in dev builds");
    }

    let shutdown = CancellationToken::new();
    let checkpoint_task = config.checkpoint_interval.map(|interval| {
        let checkpointer = Checkpointer::new(handle.clone(), db.clone(), interval);
        tokio::spawn(checkpointer.run(shutdown.clone()))
    });

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("bind {addr}: {e}"))?;
    info!(%addr, envelope = %handle.stats().await.envelope, "Trial match ledger listening (docs at /docs)");

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown.cancel();
    if let Some(task) = checkpoint_task {
        if let Err(e) = task.await {
            warn!(error = %e, "Checkpoint task ended abnormally");
        }
    }

    handle.settle_anchors().await;
    let buffers = handle
        .snapshot()
        .await
        .map_err(|e| format!("final snapshot: {e}"))?;
    db.save(&buffers)
        .map_err(|e| format!("final snapshot save: {e}"))?;
    info!(records = buffers.record_count(), "Final snapshot written");

    served.map_err(|e| format!("server: {e}"))
}
