// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer-token rejections.
//!
//! These never reach the ledger, so they carry no audit entry. The body is
//! `{"error": .., "error_code": ..}`; 401s also set `WWW-Authenticate`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

const CHALLENGE: &str = "Bearer realm=\"trial-ledger\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingAuthHeader,

    #[error("Authorization header must be 'Bearer <token>'")]
    InvalidAuthHeader,

    #[error("Bearer token could not be decoded")]
    MalformedToken,

    #[error("Bearer token signature does not verify")]
    InvalidSignature,

    #[error("Bearer token has expired")]
    TokenExpired,

    #[error("Bearer token was issued by an unexpected issuer")]
    InvalidIssuer,

    #[error("Bearer token is not valid yet")]
    TokenNotYetValid,

    /// No verification key is configured and unsigned tokens are refused.
    #[error("Token verification is not configured (set JWT_SECRET)")]
    VerificationUnavailable,

    /// The caller authenticated but lacks the role the route requires.
    #[error("Caller role does not permit this operation")]
    InsufficientPermissions,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: &'static str,
}

impl AuthError {
    /// Stable machine-readable code, safe for clients to match on.
    pub fn error_code(&self) -> &'static str {
        self.classify().1
    }

    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    fn classify(&self) -> (StatusCode, &'static str) {
        use AuthError::*;
        match self {
            MissingAuthHeader => (StatusCode::UNAUTHORIZED, "missing_auth_header"),
            InvalidAuthHeader => (StatusCode::UNAUTHORIZED, "invalid_auth_header"),
            MalformedToken => (StatusCode::UNAUTHORIZED, "malformed_token"),
            InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
            TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired"),
            InvalidIssuer => (StatusCode::UNAUTHORIZED, "invalid_issuer"),
            TokenNotYetValid => (StatusCode::UNAUTHORIZED, "token_not_yet_valid"),
            VerificationUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "verification_unavailable",
            ),
            InsufficientPermissions => (StatusCode::FORBIDDEN, "insufficient_permissions"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.classify();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code,
        });
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(CHALLENGE),
            );
        }
        response
    }
}
