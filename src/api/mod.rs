// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    crypto::SealedPayload,
    ledger::{KeyRotationReport, LedgerStats},
    models::{
        AddTrialRequest, AddTrialResponse, AgeGroup, AgeRange, ClinicalTrial, ConsentStatus,
        CreatePatientRequest, CreatePatientResponse, Gender, MatchResult, PatientProfile,
        SensitiveDataResponse, TrialStatus, UpdateConsentRequest, UpdateTrialStatusRequest,
    },
    state::AppState,
    storage::{AuditAction, AuditEntry},
};

pub mod admin;
pub mod health;
pub mod patients;
pub mod trials;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/info", get(health::info))
        .route("/patients", post(patients::create_patient))
        .route(
            "/patients/{patient_id}",
            get(patients::get_patient).delete(patients::delete_patient),
        )
        .route(
            "/patients/{patient_id}/data",
            get(patients::read_sensitive_data),
        )
        .route(
            "/patients/{patient_id}/consent",
            put(patients::update_consent),
        )
        .route(
            "/patients/{patient_id}/matches",
            get(patients::find_trials),
        )
        .route(
            "/trials",
            get(trials::list_trials).post(trials::add_trial),
        )
        .route(
            "/trials/{trial_id}/status",
            put(trials::update_trial_status),
        )
        .route("/audit", get(admin::query_audit_log))
        .route("/admin/rotate-key", post(admin::rotate_key))
        .route("/admin/stats", get(admin::get_system_stats));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        health::info,
        patients::create_patient,
        patients::get_patient,
        patients::read_sensitive_data,
        patients::update_consent,
        patients::delete_patient,
        patients::find_trials,
        trials::add_trial,
        trials::list_trials,
        trials::update_trial_status,
        admin::query_audit_log,
        admin::rotate_key,
        admin::get_system_stats
    ),
    components(
        schemas(
            AgeGroup,
            AgeRange,
            Gender,
            ConsentStatus,
            TrialStatus,
            SealedPayload,
            PatientProfile,
            ClinicalTrial,
            MatchResult,
            CreatePatientRequest,
            CreatePatientResponse,
            UpdateConsentRequest,
            SensitiveDataResponse,
            AddTrialRequest,
            AddTrialResponse,
            UpdateTrialStatusRequest,
            AuditAction,
            AuditEntry,
            KeyRotationReport,
            LedgerStats,
            patients::ConsentUpdateResponse,
            trials::TrialStatusResponse,
            admin::AuditLogResponse,
            admin::SystemStatsResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            health::InfoResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Patients", description = "Patient profiles, consent and erasure"),
        (name = "Matching", description = "Consent-gated trial matching"),
        (name = "Trials", description = "Clinical trial listings"),
        (name = "Audit", description = "Compliance audit trail"),
        (name = "Admin", description = "Operator tooling")
    )
)]
struct ApiDoc;
