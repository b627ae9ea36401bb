use axum::http::{Method, StatusCode};
use tower::ServiceExt;

use crate::test_support;

#[tokio::test]
async fn pattern_routes_require_authentication() {
    let ctx = test_support::setup_test_context().await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/patterns", None, None))
        .await
        .expect("unauthenticated list");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn pattern_read_surface_never_leaks_answers() {
    let ctx = test_support::setup_test_context().await;
    test_support::seed_sample_pattern(&ctx);
    let token = test_support::bearer_token("student-1", ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/patterns", Some(&token), None))
        .await
        .expect("list patterns");
    assert_eq!(response.status(), StatusCode::OK);
    let listed = test_support::read_json(response).await;
    assert_eq!(listed[0]["id"], test_support::SAMPLE_PATTERN_ID);
    assert_eq!(listed[0]["total_questions"], 5);
    assert_eq!(listed[0]["total_time_seconds"], 90);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/patterns/{}", test_support::SAMPLE_PATTERN_ID),
            Some(&token),
            None,
        ))
        .await
        .expect("pattern detail");
    assert_eq!(response.status(), StatusCode::OK);
    let detail = test_support::read_json(response).await;
    assert_eq!(detail["sections"][0]["questions"].as_array().unwrap().len(), 3);
    assert_eq!(detail["sections"][1]["time_limit_seconds"], 30);
    assert!(!detail.to_string().contains("correct_answer"));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/patterns/missing",
            Some(&token),
            None,
        ))
        .await
        .expect("missing pattern");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
