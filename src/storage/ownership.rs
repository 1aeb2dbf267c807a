// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for ledger records.
//!
//! Patients belong to the caller that created them and trials to their
//! sponsor. Every owner-restricted operation passes through
//! [`OwnershipEnforcer::verify_ownership`]; admins bypass the owner check.

use crate::auth::AuthorizationOracle;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{ClinicalTrial, PatientProfile};

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Caller id of the owner.
    fn owner_id(&self) -> &str;

    /// Short resource label used in denial messages.
    fn resource_label(&self) -> String;
}

impl OwnedResource for PatientProfile {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn resource_label(&self) -> String {
        format!("patient {}", self.id)
    }
}

impl OwnedResource for ClinicalTrial {
    fn owner_id(&self) -> &str {
        &self.sponsor_id
    }

    fn resource_label(&self) -> String {
        format!("trial {}", self.id)
    }
}

pub trait OwnershipEnforcer {
    /// Verify that `caller` owns this resource or is an admin.
    ///
    /// # Errors
    /// Returns `LedgerError::Unauthorized` otherwise.
    fn verify_ownership(&self, caller: &str, oracle: &dyn AuthorizationOracle)
        -> LedgerResult<()>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(
        &self,
        caller: &str,
        oracle: &dyn AuthorizationOracle,
    ) -> LedgerResult<()> {
        if self.owner_id() == caller || oracle.is_admin(caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized(format!(
                "caller {caller} may not modify {}",
                self.resource_label()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticRoleOracle;

    struct TestResource {
        owner: String,
    }

    impl OwnedResource for TestResource {
        fn owner_id(&self) -> &str {
            &self.owner
        }

        fn resource_label(&self) -> String {
            "test resource".to_string()
        }
    }

    fn oracle() -> StaticRoleOracle {
        StaticRoleOracle::new(["root"], ["pharma"])
    }

    #[test]
    fn owner_can_access() {
        let resource = TestResource {
            owner: "alice".to_string(),
        };
        assert!(resource.verify_ownership("alice", &oracle()).is_ok());
    }

    #[test]
    fn non_owner_denied() {
        let resource = TestResource {
            owner: "alice".to_string(),
        };
        let err = resource.verify_ownership("mallory", &oracle()).unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
    }

    #[test]
    fn admin_bypasses_owner_check() {
        let resource = TestResource {
            owner: "alice".to_string(),
        };
        assert!(resource.verify_ownership("root", &oracle()).is_ok());
    }

    #[test]
    fn sponsor_role_alone_is_not_ownership() {
        let resource = TestResource {
            owner: "alice".to_string(),
        };
        assert!(resource.verify_ownership("pharma", &oracle()).is_err());
    }
}
