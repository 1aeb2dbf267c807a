// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger failure taxonomy and its HTTP mapping.
//!
//! Caller-facing failures (`InvalidInput`, `NotFound`, `Unauthorized`,
//! `RateLimited`, `DecryptionFailed`) are returned as typed values. Failures
//! of best-effort tails (anchoring, per-record rotation, snapshot recovery)
//! are written to the audit trail instead of being returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::anchor::AnchorError;
use crate::crypto::CryptoError;
use crate::storage::SnapshotDbError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited: caller {0} exhausted the current window")]
    RateLimited(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("system error: {0}")]
    SystemError(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<CryptoError> for LedgerError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Decryption(msg) => LedgerError::DecryptionFailed(msg),
            CryptoError::UnknownKeyVersion(v) => {
                LedgerError::DecryptionFailed(format!("no key for version {v}"))
            }
            other => LedgerError::SystemError(other.to_string()),
        }
    }
}

impl From<AnchorError> for LedgerError {
    fn from(e: AnchorError) -> Self {
        LedgerError::SystemError(e.to_string())
    }
}

impl From<SnapshotDbError> for LedgerError {
    fn from(e: SnapshotDbError) -> Self {
        LedgerError::SystemError(e.to_string())
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let status = match &e {
            LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Unauthorized(_) => StatusCode::FORBIDDEN,
            LedgerError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            LedgerError::DecryptionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::SystemError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
