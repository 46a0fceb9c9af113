//! Conference endpoints for collaborators
//!
//! These are the out-of-band operations: pre-creating conferences and rooms,
//! reading snapshots, and administrative kicks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use agora_core::models::{ConferenceId, ParticipantId, RoomOptions};

use crate::http::{AppResult, AppState};

pub fn create_conference_router() -> Router<AppState> {
    Router::new()
        .route("/api/conferences", post(create_conference))
        .route("/api/conferences/{conference_id}", get(get_conference))
        .route("/api/conferences/{conference_id}/rooms", post(create_room))
        .route(
            "/api/conferences/{conference_id}/participants/{participant_id}/kick",
            post(kick_participant),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConferenceResponse {
    pub conference_id: ConferenceId,
}

/// Create an empty conference
pub async fn create_conference(State(state): State<AppState>) -> impl IntoResponse {
    let conference_id = state.coordinator.create_conference();
    info!(conference_id = %conference_id, "Conference created via API");

    (
        StatusCode::CREATED,
        Json(CreateConferenceResponse { conference_id }),
    )
}

/// Current participants and rooms of a conference
pub async fn get_conference(
    State(state): State<AppState>,
    Path(conference_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state
        .coordinator
        .conference_snapshot(&ConferenceId::from_string(conference_id))?;
    Ok(Json(snapshot))
}

pub async fn create_room(
    State(state): State<AppState>,
    Path(conference_id): Path<String>,
    Json(options): Json<RoomOptions>,
) -> AppResult<impl IntoResponse> {
    let summary = state
        .coordinator
        .create_room(&ConferenceId::from_string(conference_id), options)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn kick_participant(
    State(state): State<AppState>,
    Path((conference_id, participant_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    state.coordinator.kick(
        &ConferenceId::from_string(conference_id),
        &ParticipantId::from_string(participant_id),
    )?;
    Ok(StatusCode::NO_CONTENT)
}
