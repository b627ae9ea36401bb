use anyhow::{Context, Result};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::services::attempts;

/// One watchdog sweep: find in-progress attempts whose active-section
/// deadline has passed and push each through the ordinary section
/// transition. A failure on one attempt never stalls the rest.
pub(crate) async fn close_due_sections(state: &AppState) -> Result<usize> {
    let now = primitive_now_utc();
    let due = state.attempts().list_due(now).await.context("Failed to list due attempts")?;

    if due.is_empty() {
        return Ok(0);
    }

    let mut closed = 0;

    for attempt in due {
        match attempts::complete_due_section(state, &attempt.id).await {
            Ok(true) => closed += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::error!(
                    attempt_id = %attempt.id,
                    error = %err,
                    "Failed to close expired section"
                );
            }
        }
    }

    if closed > 0 {
        tracing::info!(closed_sections = closed, "Closed expired sections");
        metrics::counter!("expired_sections_closed_total").increment(closed as u64);
    }

    Ok(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::{AttemptStatus, SectionStatus};
    use crate::services::attempts::{start_attempt, submit_attempt};
    use crate::test_support;
    use time::Duration;

    #[tokio::test]
    async fn sweep_ignores_attempts_with_time_left() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID).await.expect("start");

        let closed = close_due_sections(&ctx.state).await.expect("sweep");
        assert_eq!(closed, 0);
    }

    #[tokio::test]
    async fn sweep_advances_overdue_attempts() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");

        test_support::rewind_section_clock(&ctx, &attempt.id, Duration::minutes(5)).await;

        let closed = close_due_sections(&ctx.state).await.expect("sweep");
        assert_eq!(closed, 1);

        let advanced = ctx.state.attempts().get(&attempt.id).await.expect("get");
        assert_eq!(advanced.current_section_index, 1);
        assert_eq!(advanced.sections[0].status, SectionStatus::Complete);
        // The whole budget was consumed, not a second more.
        assert_eq!(
            advanced.sections[0].time_spent_seconds,
            advanced.sections[0].time_limit_seconds
        );

        // Second section is overdue as well once its own clock is rewound:
        // the cascade through the last section submits the attempt.
        test_support::rewind_section_clock(&ctx, &attempt.id, Duration::minutes(5)).await;
        let closed = close_due_sections(&ctx.state).await.expect("second sweep");
        assert_eq!(closed, 1);

        let finished = ctx.state.attempts().get(&attempt.id).await.expect("get");
        assert_eq!(finished.status, AttemptStatus::Submitted);
        assert!(finished.graded.is_some());
    }

    #[tokio::test]
    async fn sweep_skips_already_submitted_attempts() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");
        submit_attempt(&ctx.state, "u-1", &attempt.id).await.expect("submit");

        let closed = close_due_sections(&ctx.state).await.expect("sweep");
        assert_eq!(closed, 0);
    }
}
