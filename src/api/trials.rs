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
        AddTrialRequest, AddTrialResponse, ClinicalTrial, TrialId, TrialStatus,
        UpdateTrialStatusRequest,
    },
    state::AppState,
};

/// Trial status change result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrialStatusResponse {
    pub trial_id: TrialId,
    pub previous: TrialStatus,
    pub status: TrialStatus,
}

#[utoipa::path(
    post,
    path = "/v1/trials",
    request_body = AddTrialRequest,
    tag = "Trials",
    responses(
        (status = 201, body = AddTrialResponse),
        (status = 400, description = "Invalid age range or empty criteria"),
        (status = 403, description = "Caller is not an approved sponsor")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_trial(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<AddTrialRequest>,
) -> Result<(StatusCode, Json<AddTrialResponse>), ApiError> {
    let trial_id = state
        .ledger
        .add_clinical_trial(&user.caller_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(AddTrialResponse { trial_id })))
}

#[utoipa::path(
    get,
    path = "/v1/trials",
    tag = "Trials",
    responses((status = 200, body = [ClinicalTrial])),
    security(("bearer_auth" = []))
)]
pub async fn list_trials(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Json<Vec<ClinicalTrial>> {
    Json(state.ledger.get_all_trials().await)
}

#[utoipa::path(
    put,
    path = "/v1/trials/{trial_id}/status",
    params(("trial_id" = String, Path, description = "Trial identifier")),
    request_body = UpdateTrialStatusRequest,
    tag = "Trials",
    responses(
        (status = 200, body = TrialStatusResponse),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Not the trial sponsor"),
        (status = 404, description = "Unknown trial")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_trial_status(
    Auth(user): Auth,
    Path(trial_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<UpdateTrialStatusRequest>,
) -> Result<Json<TrialStatusResponse>, ApiError> {
    let previous = state
        .ledger
        .update_trial_status(&user.caller_id, &trial_id, request.status)
        .await?;
    Ok(Json(TrialStatusResponse {
        trial_id,
        previous,
        status: request.status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedUser, Role};
    use crate::models::{AgeRange, Gender};
    use crate::state::test_support::test_state;

    fn user(caller_id: &str, role: Role) -> Auth {
        Auth(AuthenticatedUser {
            caller_id: caller_id.to_string(),
            role,
            issuer: "test".to_string(),
            expires_at: 0,
        })
    }

    fn request(min: u32, max: u32) -> AddTrialRequest {
        AddTrialRequest {
            title: "Asthma biologic".into(),
            description: "Phase III".into(),
            required_symptoms: vec!["wheezing".into()],
            eligible_locations: vec!["Boston".into()],
            age_range: AgeRange { min, max },
            eligible_genders: vec![Gender::Female, Gender::Male],
        }
    }

    #[tokio::test]
    async fn sponsor_adds_and_lists_trial() {
        let state = test_state();
        let (status, Json(created)) = add_trial(
            user("sponsor_1", Role::Sponsor),
            State(state.clone()),
            Json(request(18, 65)),
        )
        .await
        .expect("trial creation succeeds");
        assert_eq!(status, StatusCode::CREATED);

        let Json(trials) = list_trials(user("anyone", Role::Patient), State(state)).await;
        assert_eq!(trials.len(), 1);
        assert_eq!(trials[0].id, created.trial_id);
    }

    #[tokio::test]
    async fn inverted_age_range_is_400() {
        let state = test_state();
        let err = add_trial(
            user("sponsor_1", Role::Sponsor),
            State(state),
            Json(request(70, 20)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unapproved_sponsor_is_403() {
        let state = test_state();
        let err = add_trial(user("alice", Role::Patient), State(state), Json(request(18, 65)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn status_transitions() {
        let state = test_state();
        let (_, Json(created)) = add_trial(
            user("sponsor_1", Role::Sponsor),
            State(state.clone()),
            Json(request(18, 65)),
        )
        .await
        .unwrap();

        let Json(paused) = update_trial_status(
            user("sponsor_1", Role::Sponsor),
            Path(created.trial_id.clone()),
            State(state.clone()),
            Json(UpdateTrialStatusRequest {
                status: TrialStatus::Paused,
            }),
        )
        .await
        .unwrap();
        assert_eq!(paused.previous, TrialStatus::Active);

        let err = update_trial_status(
            user("sponsor_1", Role::Sponsor),
            Path("missing".into()),
            State(state),
            Json(UpdateTrialStatusRequest {
                status: TrialStatus::Active,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
