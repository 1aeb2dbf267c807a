// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Caller roles.
///
/// ## Role Hierarchy
///
/// - `Admin` - May act on any patient or trial and rotate keys
/// - `Sponsor` - May register trials and manage the ones it registered
/// - `Patient` - May create profiles and manage its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Sponsor,
    Patient,
}

impl Default for Role {
    /// Least privilege for authenticated callers.
    fn default() -> Self {
        Role::Patient
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Sponsor => write!(f, "sponsor"),
            Role::Patient => write!(f, "patient"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Sponsor).unwrap(), "\"sponsor\"");
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn default_role_is_patient() {
        assert_eq!(Role::default(), Role::Patient);
    }
}
