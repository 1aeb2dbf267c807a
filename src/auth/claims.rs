// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated caller representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims read from a bearer token.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JwtClaims {
    /// Subject; becomes the ledger caller id.
    pub sub: String,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub iss: String,
}

/// Authenticated caller extracted from a verified JWT.
///
/// The role is not taken from the token; it is resolved through the
/// authorization oracle so that the ledger and the HTTP layer agree.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical caller id (JWT `sub`).
    pub caller_id: String,
    pub role: Role,
    pub issuer: String,
    /// Token expiration (unix seconds, 0 when absent).
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
