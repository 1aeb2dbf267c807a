// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Anchoring Client
//!
//! Records a patient's payload hash with an external attestation service.
//!
//! Anchoring is fire-and-forget from the ledger's point of view: profile
//! creation never waits for it and never fails because of it. The returned
//! reference is written back onto the profile when (and if) it arrives.
//!
//! ## Implementations
//!
//! - [`HttpAnchorService`] - POSTs to `ANCHOR_URL`
//! - [`SimulatedAnchorService`] - deterministic local reference, used when
//!   no endpoint is configured

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    #[error("anchor request timed out after {0:?}")]
    Timeout(Duration),

    #[error("anchor request failed: {0}")]
    Request(String),

    #[error("anchor service rejected request: {0}")]
    Rejected(String),

    #[error("invalid anchor response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait AnchorService: Send + Sync {
    /// Anchor `payload_hash` for `patient_id` and return the external reference.
    async fn anchor(&self, patient_id: &str, payload_hash: &str) -> Result<String, AnchorError>;

    fn name(&self) -> &'static str;
}

/// Local stand-in that derives the reference from the hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedAnchorService;

const SIMULATED_PREFIX: &str = "sim_anchor_";

#[async_trait]
impl AnchorService for SimulatedAnchorService {
    async fn anchor(&self, _patient_id: &str, payload_hash: &str) -> Result<String, AnchorError> {
        let short = payload_hash.get(..16).unwrap_or(payload_hash);
        Ok(format!("{SIMULATED_PREFIX}{short}"))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[derive(Debug, Serialize)]
struct AnchorRequest<'a> {
    patient_id: &'a str,
    data_hash: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnchorResponse {
    #[serde(alias = "transaction_hash", alias = "tx_hash")]
    anchor_ref: String,
}

/// JSON-over-HTTP anchoring client.
#[derive(Debug, Clone)]
pub struct HttpAnchorService {
    endpoint: String,
    http: Client,
}

impl HttpAnchorService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AnchorError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnchorError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }
}

#[async_trait]
impl AnchorService for HttpAnchorService {
    async fn anchor(&self, patient_id: &str, payload_hash: &str) -> Result<String, AnchorError> {
        let request = AnchorRequest {
            patient_id,
            data_hash: payload_hash,
            description: "Clinical trial data anchor",
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnchorError::Request(format!("POST {} failed: {e}", self.endpoint)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnchorError::Rejected(format!("{status}: {body}")));
        }

        let parsed: AnchorResponse = response
            .json()
            .await
            .map_err(|e| AnchorError::InvalidResponse(e.to_string()))?;

        if parsed.anchor_ref.trim().is_empty() {
            return Err(AnchorError::InvalidResponse(
                "response did not include an anchor reference".to_string(),
            ));
        }

        Ok(parsed.anchor_ref)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_reference_uses_hash_prefix() {
        let hash = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        let reference = SimulatedAnchorService.anchor("p1", hash).await.unwrap();
        assert_eq!(reference, "sim_anchor_ba7816bf8f01cfea");
    }

    #[tokio::test]
    async fn simulated_handles_short_hash() {
        let reference = SimulatedAnchorService.anchor("p1", "abc").await.unwrap();
        assert_eq!(reference, "sim_anchor_abc");
    }

    #[test]
    fn response_accepts_transaction_hash_alias() {
        let parsed: AnchorResponse =
            serde_json::from_str(r#"{"transaction_hash":"0xabc"}"#).unwrap();
        assert_eq!(parsed.anchor_ref, "0xabc");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_error() {
        let service =
            HttpAnchorService::new("http://127.0.0.1:9/anchor", Duration::from_millis(500)).unwrap();
        let err = service.anchor("p1", "abc").await.unwrap_err();
        assert!(matches!(err, AnchorError::Request(_)));
    }
}
