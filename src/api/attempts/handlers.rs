use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::attempt::{
    attempt_to_response, attempt_to_summary, graded_to_response, AttemptResponse,
    AttemptSummaryResponse, GradedResultResponse, RecordAnswerRequest, StartAttemptRequest,
};
use crate::services::attempts::{self, AnswerInput};

pub(super) async fn start_attempt(
    CurrentUser(owner_id): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = attempts::start_attempt(&state, &owner_id, &payload.pattern_id).await?;

    Ok((StatusCode::CREATED, Json(attempt_to_response(&attempt, primitive_now_utc()))))
}

pub(super) async fn list_my_attempts(
    CurrentUser(owner_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptSummaryResponse>>, ApiError> {
    let listed = attempts::list_attempts(&state, &owner_id).await?;

    Ok(Json(listed.iter().map(attempt_to_summary).collect()))
}

pub(super) async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(owner_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt = attempts::get_attempt(&state, &owner_id, &attempt_id).await?;

    Ok(Json(attempt_to_response(&attempt, primitive_now_utc())))
}

pub(super) async fn record_answer(
    Path(attempt_id): Path<String>,
    CurrentUser(owner_id): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<RecordAnswerRequest>,
) -> Result<Json<AttemptResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let input = AnswerInput {
        section_index: payload.section_index as usize,
        question_index: payload.question_index as usize,
        selected_answer: payload.selected_answer,
        time_taken_seconds: payload.time_taken_seconds,
        is_marked_for_review: payload.is_marked_for_review,
    };
    let attempt = attempts::record_answer(&state, &owner_id, &attempt_id, &input).await?;

    Ok(Json(attempt_to_response(&attempt, primitive_now_utc())))
}

pub(super) async fn complete_section(
    Path((attempt_id, section_index)): Path<(String, usize)>,
    CurrentUser(owner_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt =
        attempts::complete_section(&state, &owner_id, &attempt_id, section_index).await?;

    Ok(Json(attempt_to_response(&attempt, primitive_now_utc())))
}

pub(super) async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(owner_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<GradedResultResponse>, ApiError> {
    let attempt = attempts::submit_attempt(&state, &owner_id, &attempt_id).await?;

    let graded = attempt
        .graded
        .as_ref()
        .ok_or_else(|| ApiError::Internal("Graded result missing after submit".to_string()))?;

    Ok(Json(graded_to_response(&attempt.id, graded)))
}

pub(super) async fn get_result(
    Path(attempt_id): Path<String>,
    CurrentUser(owner_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<GradedResultResponse>, ApiError> {
    let graded = attempts::graded_result(&state, &owner_id, &attempt_id).await?;

    Ok(Json(graded_to_response(&attempt_id, &graded)))
}
