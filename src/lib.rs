// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trial Match Ledger - Consent-Gated Patient to Clinical-Trial Matching
//!
//! A single-writer ledger that owns patient profiles, trial listings, consent
//! state and an append-only audit trail. Sensitive patient payloads are
//! sealed at rest; matching only ever sees the public profile fields.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer-token authentication and the role oracle
//! - `ledger` - The ledger actor: lifecycle, consent, matching, persistence
//! - `crypto` - Payload envelopes and eligibility proofs
//! - `anchor` - External integrity anchoring
//! - `storage` - Audit trail, ownership checks, redb snapshots

pub mod anchor;
pub mod api;
pub mod auth;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;
