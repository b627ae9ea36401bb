use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::pattern::{
    pattern_to_detail, pattern_to_response, PatternDetailResponse, PatternResponse,
};

pub(super) async fn list_patterns(
    CurrentUser(_owner_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PatternResponse>>, ApiError> {
    let patterns = state
        .catalog()
        .list()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list test patterns"))?;

    Ok(Json(patterns.iter().map(pattern_to_response).collect()))
}

pub(super) async fn get_pattern(
    Path(pattern_id): Path<String>,
    CurrentUser(_owner_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PatternDetailResponse>, ApiError> {
    let pattern = state
        .catalog()
        .get(&pattern_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test pattern"))?
        .ok_or_else(|| ApiError::NotFound("Test pattern not found".to_string()))?;

    let question_ids: Vec<String> =
        pattern.sections.iter().flat_map(|section| section.question_ids.clone()).collect();
    let meta = state
        .bank()
        .display_meta(&question_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question metadata"))?;

    Ok(Json(pattern_to_detail(&pattern, &meta)))
}
