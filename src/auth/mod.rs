// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer-token authentication for the ledger API.
//!
//! ## Auth Flow
//!
//! 1. Client sends `Authorization: Bearer <JWT>`
//! 2. Server:
//!    - Verifies the HS256 signature against `JWT_SECRET`
//!    - Checks expiry (60 second clock skew tolerance) and issuer
//!    - Uses `sub` as the ledger caller id
//! 3. The caller's role comes from the [`AuthorizationOracle`], not the token
//!
//! ## Security
//!
//! - All non-health endpoints require authentication
//! - Unsigned tokens are only accepted in builds with the `dev` feature

pub mod claims;
pub mod error;
pub mod extractor;
pub mod oracle;
pub mod roles;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use oracle::{AuthorizationOracle, StaticRoleOracle};
pub use roles::Role;
