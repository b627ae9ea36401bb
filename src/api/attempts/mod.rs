mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::start_attempt).get(handlers::list_my_attempts))
        .route("/:attempt_id", get(handlers::get_attempt))
        .route("/:attempt_id/answers", post(handlers::record_answer))
        .route("/:attempt_id/sections/:section_index/complete", post(handlers::complete_section))
        .route("/:attempt_id/submit", post(handlers::submit_attempt))
        .route("/:attempt_id/result", get(handlers::get_result))
}
