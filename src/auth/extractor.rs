// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated callers.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user.caller_id is the ledger caller
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::claims::JwtClaims;
use super::{AuthError, AuthenticatedUser};
use crate::state::{AppState, AuthConfig};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Extractor for authenticated callers.
///
/// ## Authentication Modes
///
/// - **Production mode** (`JWT_SECRET` set): HS256 signature, expiry and
///   (optionally) issuer are verified
/// - **Development mode** (`dev` feature, no secret): structure and expiry
///   only, no signature check
///
/// Without a secret and without the `dev` feature every request is rejected.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = verify_jwt(token, &state.auth_config)?;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::MalformedToken);
        }

        let role = state.oracle.role_of(&claims.sub);
        tracing::debug!(caller = %claims.sub, %role, "Bearer token accepted");
        Ok(Auth(AuthenticatedUser {
            caller_id: claims.sub,
            role,
            issuer: claims.iss,
            expires_at: claims.exp,
        }))
    }
}

fn verify_jwt(token: &str, auth_config: &AuthConfig) -> Result<JwtClaims, AuthError> {
    match auth_config.jwt_secret.as_deref() {
        Some(secret) => verify_jwt_production(token, secret, auth_config.issuer.as_deref()),
        None => verify_jwt_development(token),
    }
}

/// HS256 verification against the shared secret.
fn verify_jwt_production(
    token: &str,
    secret: &str,
    issuer: Option<&str>,
) -> Result<JwtClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.validate_aud = false;
    if let Some(issuer) = issuer {
        validation.set_issuer(&[issuer]);
    }

    let key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<JwtClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        _ => AuthError::MalformedToken,
    })?;

    Ok(token_data.claims)
}

/// Development JWT verification (no signature check).
///
/// WARNING: This should only be used in development environments.
#[cfg(any(test, feature = "dev"))]
fn verify_jwt_development(token: &str) -> Result<JwtClaims, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<JwtClaims>(token)
        .map_err(|_e| AuthError::MalformedToken)?;

    let claims = token_data.claims;
    let now = chrono::Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

#[cfg(not(any(test, feature = "dev")))]
fn verify_jwt_development(_token: &str) -> Result<JwtClaims, AuthError> {
    tracing::error!("Rejecting request: JWT_SECRET is not set and the dev feature is disabled");
    Err(AuthError::VerificationUnavailable)
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::state::test_support::test_state;
    use axum::http::Request;

    /// Unsigned test JWT for development-mode verification.
    pub(crate) fn create_test_jwt(caller_id: &str) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let header = r#"{"alg":"HS256","typ":"JWT"}"#;
        let claims = format!(
            r#"{{"sub":"{}","iat":1609459200,"exp":9999999999,"iss":"test"}}"#,
            caller_id
        );

        let header_b64 = URL_SAFE_NO_PAD.encode(header.as_bytes());
        let claims_b64 = URL_SAFE_NO_PAD.encode(claims.as_bytes());

        format!("{}.{}.fake_signature", header_b64, claims_b64)
    }

    fn parts_with_token(token: &str) -> Parts {
        Request::builder()
            .uri("/test")
            .header("Authorization", format!("Bearer {}", token))
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let state = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_non_bearer_scheme() {
        let state = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_jwt() {
        let state = test_state();
        let mut parts = parts_with_token(&create_test_jwt("patient_123"));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.caller_id, "patient_123");
        assert_eq!(user.role, Role::Patient);
    }

    #[tokio::test]
    async fn role_is_resolved_through_oracle() {
        let state = test_state();
        let mut parts = parts_with_token(&create_test_jwt("sponsor_1"));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.role, Role::Sponsor);
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let state = test_state();
        let mut parts = parts_with_token("not-a-jwt");

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn signed_token_verified_with_secret() {
        let mut state = test_state();
        state.auth_config = AuthConfig {
            jwt_secret: Some("test-secret".to_string()),
            issuer: None,
        };

        let claims = serde_json::json!({ "sub": "admin_1", "exp": 9999999999i64, "iss": "ledger" });
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let mut parts = parts_with_token(&token);
        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.caller_id, "admin_1");
        assert!(user.is_admin());

        // Unsigned tokens are refused once a secret is configured
        let mut parts = parts_with_token(&create_test_jwt("admin_1"));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(
            result,
            Err(AuthError::InvalidSignature) | Err(AuthError::MalformedToken)
        ));
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let state = test_state();
        let mut parts = parts_with_token(&create_test_jwt("patient_123"));

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn admin_only_accepts_admin() {
        let state = test_state();
        let mut parts = parts_with_token(&create_test_jwt("admin_1"));

        let AdminOnly(user) = AdminOnly::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.caller_id, "admin_1");
    }
}
