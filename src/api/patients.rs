// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    models::{
        ConsentStatus, CreatePatientRequest, CreatePatientResponse, MatchResult, PatientId,
        PatientProfile, SensitiveDataResponse, UpdateConsentRequest,
    },
    state::AppState,
};

/// Consent change result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsentUpdateResponse {
    pub patient_id: PatientId,
    pub previous: ConsentStatus,
    pub consent: ConsentStatus,
}

#[utoipa::path(
    post,
    path = "/v1/patients",
    request_body = CreatePatientRequest,
    tag = "Patients",
    responses(
        (status = 201, body = CreatePatientResponse),
        (status = 400, description = "Empty symptoms or location"),
        (status = 429, description = "Rate limit exceeded")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_patient(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<CreatePatientResponse>), ApiError> {
    let response = state.ledger.create_patient(&user.caller_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/v1/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    tag = "Patients",
    responses(
        (status = 200, body = PatientProfile),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown patient")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_patient(
    Auth(user): Auth,
    Path(patient_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PatientProfile>, ApiError> {
    let patient = state.ledger.get_patient(&user.caller_id, &patient_id).await?;
    Ok(Json(patient))
}

#[utoipa::path(
    get,
    path = "/v1/patients/{patient_id}/data",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    tag = "Patients",
    responses(
        (status = 200, body = SensitiveDataResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown patient"),
        (status = 422, description = "Payload could not be decrypted or failed its integrity check")
    ),
    security(("bearer_auth" = []))
)]
pub async fn read_sensitive_data(
    Auth(user): Auth,
    Path(patient_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SensitiveDataResponse>, ApiError> {
    let data = state
        .ledger
        .read_sensitive_data(&user.caller_id, &patient_id)
        .await?;
    Ok(Json(data))
}

#[utoipa::path(
    put,
    path = "/v1/patients/{patient_id}/consent",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    request_body = UpdateConsentRequest,
    tag = "Patients",
    responses(
        (status = 200, body = ConsentUpdateResponse),
        (status = 400, description = "Consent cannot return to pending"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown patient")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_consent(
    Auth(user): Auth,
    Path(patient_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<UpdateConsentRequest>,
) -> Result<Json<ConsentUpdateResponse>, ApiError> {
    let previous = state
        .ledger
        .update_consent(&user.caller_id, &patient_id, request.consent)
        .await?;
    Ok(Json(ConsentUpdateResponse {
        patient_id,
        previous,
        consent: request.consent,
    }))
}

#[utoipa::path(
    delete,
    path = "/v1/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    tag = "Patients",
    responses(
        (status = 204),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown patient")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_patient(
    Auth(user): Auth,
    Path(patient_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state
        .ledger
        .delete_patient_data(&user.caller_id, &patient_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/patients/{patient_id}/matches",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    tag = "Matching",
    responses(
        (status = 200, body = [MatchResult]),
        (status = 404, description = "Unknown patient"),
        (status = 429, description = "Rate limit exceeded")
    ),
    security(("bearer_auth" = []))
)]
pub async fn find_trials(
    Auth(user): Auth,
    Path(patient_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<MatchResult>>, ApiError> {
    let matches = state.ledger.find_trials(&user.caller_id, &patient_id).await?;
    Ok(Json(matches))
}
