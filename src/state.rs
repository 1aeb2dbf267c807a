// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthorizationOracle;
use crate::ledger::LedgerHandle;

/// Bearer-token verification settings.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HS256 secret; `None` means development decoding (dev builds only).
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim, when set.
    pub issuer: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerHandle,
    pub oracle: Arc<dyn AuthorizationOracle>,
    pub auth_config: AuthConfig,
    pub data_dir: Option<PathBuf>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(ledger: LedgerHandle, oracle: Arc<dyn AuthorizationOracle>) -> Self {
        Self {
            ledger,
            oracle,
            auth_config: AuthConfig::default(),
            data_dir: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }

    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = Some(data_dir);
        self
    }
}
