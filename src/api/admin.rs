// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit trail queries and operator endpoints.
//!
//! - `GET /v1/audit` shows admins the whole trail and everyone else only
//!   the entries they made
//! - Key rotation is admin-gated inside the ledger so refusals are typed
//! - Stats require the Admin role at the extractor

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    ledger::{AuditFilter, KeyRotationReport, LedgerStats},
    state::AppState,
    storage::{AuditAction, AuditEntry},
};

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for audit log queries.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Filter by caller ID.
    pub caller_id: Option<String>,
    /// Filter by patient or trial ID mentioned in the entry.
    pub resource_id: Option<String>,
    /// Filter by action (snake_case, e.g. `consent_updated`).
    pub action: Option<String>,
    /// Maximum number of results (default 100, max 1000).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Entries matching the query, oldest first.
    pub entries: Vec<AuditEntry>,
    /// Total count (before limit/offset).
    pub total: usize,
    /// Whether there are more results.
    pub has_more: bool,
}

/// Operator statistics.
#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStatsResponse {
    pub ledger: LedgerStats,
    pub uptime_seconds: u64,
    /// Anchoring tasks still in flight.
    pub pending_anchors: usize,
    pub anchor_service: String,
}

fn parse_action(raw: &str) -> Result<AuditAction, ApiError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| ApiError::bad_request(format!("Unknown audit action: {raw}")))
}

// ============================================================================
// Handlers
// ============================================================================

/// Query the audit trail. Non-admin callers are scoped to their own entries.
#[utoipa::path(
    get,
    path = "/v1/audit",
    tag = "Audit",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit entries", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Another caller's entries requested without admin")
    )
)]
pub async fn query_audit_log(
    Auth(user): Auth,
    Query(params): Query<AuditQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let action = params.action.as_deref().map(parse_action).transpose()?;

    let entries = state
        .ledger
        .query_audit(
            &user.caller_id,
            AuditFilter {
                caller_id: params.caller_id,
                resource_id: params.resource_id,
                action,
            },
        )
        .await?;

    let total = entries.len();
    let offset = params.offset.unwrap_or(0);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .min(MAX_AUDIT_LIMIT);

    let entries: Vec<AuditEntry> = entries.into_iter().skip(offset).take(limit).collect();
    let has_more = offset.saturating_add(entries.len()) < total;

    Ok(Json(AuditLogResponse {
        entries,
        total,
        has_more,
    }))
}

/// Re-seal every payload under a fresh key version. Admin only.
#[utoipa::path(
    post,
    path = "/v1/admin/rotate-key",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rotation summary", body = KeyRotationReport),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn rotate_key(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<KeyRotationReport>, ApiError> {
    let report = state.ledger.rotate_encryption_key(&user.caller_id).await?;
    Ok(Json(report))
}

/// Get ledger statistics. Admin only.
#[utoipa::path(
    get,
    path = "/v1/admin/stats",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ledger statistics", body = SystemStatsResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn get_system_stats(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Json<SystemStatsResponse> {
    Json(SystemStatsResponse {
        ledger: state.ledger.stats().await,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        pending_anchors: state.ledger.pending_anchors(),
        anchor_service: state.ledger.anchor_service().to_string(),
    })
}
