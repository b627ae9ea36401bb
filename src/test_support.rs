use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, security, state::AppState};
use crate::db::models::{QuestionMeta, SectionSpec, TestPattern};
use crate::db::types::Difficulty;
use crate::stores::memory::{MemoryAttemptStore, MemoryPatternCatalog, MemoryQuestionBank};
use crate::stores::{AttemptStore, Stores};

pub(crate) const SAMPLE_PATTERN_ID: &str = "pat-aptitude-1";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) catalog: Arc<MemoryPatternCatalog>,
    pub(crate) bank: Arc<MemoryQuestionBank>,
    pub(crate) attempts: Arc<MemoryAttemptStore>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("PREPDECK_ENV", "test");
    std::env::set_var("PREPDECK_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", "test-secret");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");

    let attempts = Arc::new(MemoryAttemptStore::new());
    let catalog = Arc::new(MemoryPatternCatalog::new());
    let bank = Arc::new(MemoryQuestionBank::new());

    let stores = Stores {
        attempts: attempts.clone(),
        catalog: catalog.clone(),
        bank: bank.clone(),
    };
    let state = AppState::new(settings, stores);
    let app = api::router::router(state.clone());

    TestContext { state, app, catalog, bank, attempts, _guard: guard }
}

/// Two-section fixture: Section A (3 questions, 60s, answers B/A/C) and
/// Section B (2 questions, 30s, answers D/B).
pub(crate) fn seed_sample_pattern(ctx: &TestContext) {
    let questions = [
        ("q-a1", "If all widgets are gadgets...", "B"),
        ("q-a2", "Which number completes the series?", "A"),
        ("q-a3", "Select the odd one out.", "C"),
        ("q-b1", "Pick the synonym of 'terse'.", "D"),
        ("q-b2", "Complete the analogy.", "B"),
    ];

    for (id, text, correct) in questions {
        ctx.bank.insert(
            QuestionMeta {
                id: id.to_string(),
                text: text.to_string(),
                options: vec![
                    "A".to_string(),
                    "B".to_string(),
                    "C".to_string(),
                    "D".to_string(),
                ],
                difficulty: Difficulty::Medium,
            },
            correct,
        );
    }

    ctx.catalog.insert(TestPattern {
        id: SAMPLE_PATTERN_ID.to_string(),
        name: "Aptitude Mock I".to_string(),
        cutoff_percentage: 40.0,
        sections: vec![
            SectionSpec {
                name: "Section A".to_string(),
                question_ids: vec![
                    "q-a1".to_string(),
                    "q-a2".to_string(),
                    "q-a3".to_string(),
                ],
                time_limit_seconds: 60,
            },
            SectionSpec {
                name: "Section B".to_string(),
                question_ids: vec!["q-b1".to_string(), "q-b2".to_string()],
                time_limit_seconds: 30,
            },
        ],
    });
}

/// Shifts the active section's clock into the past so expiry paths can be
/// exercised without sleeping through real time limits.
pub(crate) async fn rewind_section_clock(
    ctx: &TestContext,
    attempt_id: &str,
    by: time::Duration,
) {
    let mut attempt = ctx.attempts.get(attempt_id).await.expect("attempt");

    let current = attempt.current_section_index;
    if let Some(activated_at) = attempt.sections[current].activated_at {
        attempt.sections[current].activated_at = Some(activated_at - by);
    }
    if let Some(deadline) = attempt.section_deadline {
        attempt.section_deadline = Some(deadline - by);
    }

    ctx.attempts.update(attempt).await.expect("rewind");
}

pub(crate) fn bearer_token(user_id: &str, settings: &Settings) -> String {
    security::create_access_token(user_id, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
