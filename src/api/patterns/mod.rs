mod handlers;

use axum::{routing::get, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_patterns))
        .route("/:pattern_id", get(handlers::get_pattern))
}

#[cfg(test)]
mod tests;
