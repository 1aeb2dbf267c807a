// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role lookups consulted by the ledger.
//!
//! The ledger never decides on its own who is an admin or an approved
//! sponsor; it asks an [`AuthorizationOracle`]. The default oracle is a
//! static allow-list read from configuration.

use std::collections::HashSet;

use super::Role;

pub trait AuthorizationOracle: Send + Sync {
    fn is_approved_sponsor(&self, caller: &str) -> bool;

    fn is_admin(&self, caller: &str) -> bool;

    /// Highest role held by `caller`.
    fn role_of(&self, caller: &str) -> Role {
        if self.is_admin(caller) {
            Role::Admin
        } else if self.is_approved_sponsor(caller) {
            Role::Sponsor
        } else {
            Role::default()
        }
    }
}

/// Fixed admin and sponsor allow-lists.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleOracle {
    admins: HashSet<String>,
    sponsors: HashSet<String>,
}

impl StaticRoleOracle {
    pub fn new<A, S>(admins: A, sponsors: S) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
            sponsors: sponsors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }

    pub fn sponsor_count(&self) -> usize {
        self.sponsors.len()
    }
}

impl AuthorizationOracle for StaticRoleOracle {
    fn is_approved_sponsor(&self, caller: &str) -> bool {
        self.sponsors.contains(caller)
    }

    fn is_admin(&self, caller: &str) -> bool {
        self.admins.contains(caller)
    }
}
