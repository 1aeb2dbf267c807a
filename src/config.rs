// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`LedgerConfig`] loaded from
//! them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the snapshot database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `RATE_LIMIT_PER_WINDOW` | Calls allowed per caller per window | `100` |
//! | `RATE_LIMIT_WINDOW_SECS` | Rate window length | `60` |
//! | `ANCHOR_URL` | Anchoring endpoint; unset uses the simulated anchor | unset |
//! | `ANCHOR_TIMEOUT_MS` | Per-call anchoring timeout | `5000` |
//! | `ADMIN_IDS` | Comma-separated admin caller ids | empty |
//! | `SPONSOR_IDS` | Comma-separated approved sponsor ids | empty |
//! | `LEDGER_MASTER_KEY` | Base64 master key (>= 32 bytes) for AES-256-GCM | unset (placeholder envelope) |
//! | `PROOF_SECRET` | HMAC key for eligibility proofs | development secret |
//! | `JWT_SECRET` | HS256 secret for bearer tokens | unset |
//! | `JWT_ISSUER` | Expected `iss` claim | unset |
//! | `CHECKPOINT_INTERVAL_SECS` | Snapshot interval, `0` disables | `300` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use base64ct::{Base64, Encoding};
use tracing::warn;

use crate::ledger::RateLimitPolicy;
use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const DEFAULT_DATA_DIR: &str = DATA_ROOT;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_RATE_LIMIT: u32 = 100;
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
pub const DEFAULT_ANCHOR_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CHECKPOINT_INTERVAL_SECS: u64 = 300;

/// Used only when `PROOF_SECRET` is unset.
const DEVELOPMENT_PROOF_SECRET: &str = "trial-ledger-development-proof-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub anchor_url: Option<String>,
    pub anchor_timeout: Duration,
    pub admin_ids: Vec<String>,
    pub sponsor_ids: Vec<String>,
    /// Decoded `LEDGER_MASTER_KEY`.
    pub master_key: Option<Vec<u8>>,
    pub proof_secret: String,
    pub jwt_secret: Option<String>,
    pub jwt_issuer: Option<String>,
    /// `None` disables periodic checkpoints.
    pub checkpoint_interval: Option<Duration>,
    pub log_format: LogFormat,
    /// Problems found while loading, logged once tracing is up.
    pub warnings: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("LEDGER_MASTER_KEY is not valid base64")]
    MasterKeyEncoding,
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let master_key = match get("LEDGER_MASTER_KEY") {
            Some(encoded) => Some(
                Base64::decode_vec(&encoded).map_err(|_| ConfigError::MasterKeyEncoding)?,
            ),
            None => None,
        };

        let mut warnings = Vec::new();

        let proof_secret = get("PROOF_SECRET").unwrap_or_else(|| {
            warnings.push(
                "PROOF_SECRET not set; eligibility proofs use a development secret".to_string(),
            );
            DEVELOPMENT_PROOF_SECRET.to_string()
        });

        let mut number = |name: &str, default: u64| -> u64 {
            parse_or_default(name, get(name), default, &mut warnings)
        };
        let checkpoint_secs = number("CHECKPOINT_INTERVAL_SECS", DEFAULT_CHECKPOINT_INTERVAL_SECS);
        let rate_window_secs = number("RATE_LIMIT_WINDOW_SECS", DEFAULT_RATE_WINDOW_SECS);
        let anchor_timeout_ms = number("ANCHOR_TIMEOUT_MS", DEFAULT_ANCHOR_TIMEOUT_MS);
        let port = parse_or_default("PORT", get("PORT"), DEFAULT_PORT, &mut warnings);
        let rate_limit = parse_or_default(
            "RATE_LIMIT_PER_WINDOW",
            get("RATE_LIMIT_PER_WINDOW"),
            DEFAULT_RATE_LIMIT,
            &mut warnings,
        );

        Ok(Self {
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            rate_limit,
            rate_window: Duration::from_secs(rate_window_secs),
            anchor_url: get("ANCHOR_URL"),
            anchor_timeout: Duration::from_millis(anchor_timeout_ms),
            admin_ids: split_ids(get("ADMIN_IDS")),
            sponsor_ids: split_ids(get("SPONSOR_IDS")),
            master_key,
            proof_secret,
            jwt_secret: get("JWT_SECRET"),
            jwt_issuer: get("JWT_ISSUER"),
            checkpoint_interval: (checkpoint_secs > 0).then(|| Duration::from_secs(checkpoint_secs)),
            log_format: match get("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            warnings,
        })
    }

    /// Emit the warnings collected by [`LedgerConfig::from_lookup`].
    ///
    /// Loading runs before the subscriber exists, so call this after
    /// tracing is initialised.
    pub fn log_warnings(&self) {
        for message in &self.warnings {
            warn!("{message}");
        }
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        let window_secs = i64::try_from(self.rate_window.as_secs()).unwrap_or(i64::MAX);
        RateLimitPolicy {
            limit: self.rate_limit,
            window: chrono::TimeDelta::try_seconds(window_secs)
                .unwrap_or_else(|| chrono::TimeDelta::seconds(DEFAULT_RATE_WINDOW_SECS as i64)),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or_default<T: std::str::FromStr + Copy + std::fmt::Display>(
    name: &str,
    raw: Option<String>,
    default: T,
    warnings: &mut Vec<String>,
) -> T {
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warnings.push(format!("{name}={raw:?} is invalid; using default {default}"));
            default
        }),
    }
}

fn split_ids(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
