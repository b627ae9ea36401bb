use thiserror::Error;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Attempt, GradedResult, QuestionState, SectionState};
use crate::db::types::{AttemptStatus, SectionStatus};
use crate::services::{grading, ranking, section_clock};
use crate::stores::StoreError;

/// Bounded retry budget for the optimistic write loop. Conflicts only happen
/// when two writers race on one attempt, so a handful of retries is plenty.
const CAS_MAX_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("test pattern not found")]
    DefinitionNotFound,
    #[error("attempt not found")]
    AttemptNotFound,
    #[error("section is not active")]
    SectionNotActive,
    #[error("attempt already submitted")]
    AlreadySubmitted,
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("attempt is not graded yet")]
    NotGradedYet,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AttemptError::AttemptNotFound,
            other => AttemptError::Store(other),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerInput {
    pub(crate) section_index: usize,
    pub(crate) question_index: usize,
    pub(crate) selected_answer: Option<String>,
    pub(crate) time_taken_seconds: i64,
    pub(crate) is_marked_for_review: bool,
}

/// Starts a fresh attempt against a test pattern: clones the section and
/// question skeleton, activates section 0 and arms its deadline.
///
/// The engine does not limit how many in-progress attempts one owner may
/// hold against the same pattern; callers that want a single-attempt rule
/// enforce it before calling this.
pub(crate) async fn start_attempt(
    state: &AppState,
    owner_id: &str,
    pattern_id: &str,
) -> Result<Attempt, AttemptError> {
    let pattern = state
        .catalog()
        .get(pattern_id)
        .await?
        .filter(|pattern| !pattern.sections.is_empty())
        .ok_or(AttemptError::DefinitionNotFound)?;

    let now = primitive_now_utc();

    let mut sections: Vec<SectionState> = pattern
        .sections
        .iter()
        .map(|spec| SectionState {
            name: spec.name.clone(),
            time_limit_seconds: spec.time_limit_seconds,
            time_spent_seconds: 0,
            status: SectionStatus::Pending,
            activated_at: None,
            questions: spec
                .question_ids
                .iter()
                .map(|question_id| QuestionState {
                    question_id: question_id.clone(),
                    selected_answer: None,
                    is_marked_for_review: false,
                    is_skipped: true,
                    time_taken_seconds: 0,
                    is_correct: None,
                })
                .collect(),
        })
        .collect();

    sections[0].status = SectionStatus::Active;
    sections[0].activated_at = Some(now);
    let deadline = section_clock::deadline(now, sections[0].time_limit_seconds);

    let attempt = Attempt {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        pattern_id: pattern.id.clone(),
        status: AttemptStatus::InProgress,
        current_section_index: 0,
        started_at: now,
        completed_at: None,
        section_deadline: Some(deadline),
        sections,
        graded: None,
        version: 1,
        created_at: now,
        updated_at: now,
    };

    state.attempts().create(&attempt).await?;

    metrics::counter!("attempts_started_total").increment(1);
    tracing::info!(attempt_id = %attempt.id, pattern_id, owner_id, "Attempt started");

    Ok(attempt)
}

pub(crate) async fn get_attempt(
    state: &AppState,
    owner_id: &str,
    attempt_id: &str,
) -> Result<Attempt, AttemptError> {
    fetch_owned(state, owner_id, attempt_id).await
}

pub(crate) async fn list_attempts(
    state: &AppState,
    owner_id: &str,
) -> Result<Vec<Attempt>, AttemptError> {
    Ok(state.attempts().list_by_owner(owner_id).await?)
}

/// Records one answer into the currently active section. Idempotent: the
/// same payload applied twice leaves the question state identical. Writes to
/// any other section are rejected so a stale client cannot rewrite a section
/// the clock has already closed.
pub(crate) async fn record_answer(
    state: &AppState,
    owner_id: &str,
    attempt_id: &str,
    input: &AnswerInput,
) -> Result<Attempt, AttemptError> {
    let mut retries = 0;
    loop {
        let mut attempt = fetch_owned(state, owner_id, attempt_id).await?;

        if attempt.status == AttemptStatus::Submitted {
            return Err(AttemptError::AlreadySubmitted);
        }
        if input.section_index >= attempt.sections.len() {
            return Err(AttemptError::IndexOutOfRange);
        }
        if input.section_index != attempt.current_section_index {
            return Err(AttemptError::SectionNotActive);
        }

        let section = &mut attempt.sections[input.section_index];
        let question = section
            .questions
            .get_mut(input.question_index)
            .ok_or(AttemptError::IndexOutOfRange)?;

        question.selected_answer = input.selected_answer.clone();
        question.is_skipped = input.selected_answer.is_none();
        question.is_marked_for_review = input.is_marked_for_review;
        question.time_taken_seconds = input.time_taken_seconds.max(0);
        attempt.updated_at = primitive_now_utc();

        match state.attempts().update(attempt).await {
            Ok(saved) => {
                metrics::counter!("answers_recorded_total").increment(1);
                return Ok(saved);
            }
            Err(StoreError::VersionConflict) if retries < CAS_MAX_RETRIES => {
                retries += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Closes the given section and activates the next one, or submits the
/// attempt when the last section closes. Client expiry reports and the
/// server-side watchdog both land here, so the transition happens exactly
/// once no matter who reports first: completing an already complete section
/// is a no-op, not an error.
pub(crate) async fn complete_section(
    state: &AppState,
    owner_id: &str,
    attempt_id: &str,
    section_index: usize,
) -> Result<Attempt, AttemptError> {
    let mut retries = 0;
    loop {
        let attempt = fetch_owned(state, owner_id, attempt_id).await?;

        if section_index >= attempt.sections.len() {
            return Err(AttemptError::IndexOutOfRange);
        }
        if attempt.status == AttemptStatus::Submitted {
            if attempt.sections[section_index].status == SectionStatus::Complete {
                return Ok(attempt);
            }
            return Err(AttemptError::AlreadySubmitted);
        }
        if section_index < attempt.current_section_index {
            return Ok(attempt);
        }
        if section_index > attempt.current_section_index {
            return Err(AttemptError::SectionNotActive);
        }

        let now = primitive_now_utc();
        match advance_current_section(state, attempt, now).await {
            Ok(saved) => return Ok(saved),
            Err(AttemptError::Store(StoreError::VersionConflict)) if retries < CAS_MAX_RETRIES => {
                retries += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Terminal submission: force-closes the active section and every remaining
/// one without granting additional time, then grades. Submission is
/// observably terminal; a second submit fails instead of quietly succeeding.
pub(crate) async fn submit_attempt(
    state: &AppState,
    owner_id: &str,
    attempt_id: &str,
) -> Result<Attempt, AttemptError> {
    let mut retries = 0;
    loop {
        let mut attempt = fetch_owned(state, owner_id, attempt_id).await?;

        if attempt.status == AttemptStatus::Submitted {
            return Err(AttemptError::AlreadySubmitted);
        }

        let now = primitive_now_utc();

        let current = attempt.current_section_index;
        finalize_section(&mut attempt.sections[current], now);
        for section in attempt.sections.iter_mut().skip(current + 1) {
            // Never activated, so no time was spent in them.
            section.status = SectionStatus::Complete;
            section.time_spent_seconds = 0;
        }
        attempt.current_section_index = attempt.sections.len() - 1;

        match grade_and_submit(state, attempt, now).await {
            Ok(saved) => return Ok(saved),
            Err(AttemptError::Store(StoreError::VersionConflict)) if retries < CAS_MAX_RETRIES => {
                retries += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Graded result with its standing refreshed over the current population, so
/// attempts submitted later re-rank this one on every read.
pub(crate) async fn graded_result(
    state: &AppState,
    owner_id: &str,
    attempt_id: &str,
) -> Result<GradedResult, AttemptError> {
    let attempt = fetch_owned(state, owner_id, attempt_id).await?;

    let Some(mut graded) = attempt.graded else {
        return Err(AttemptError::NotGradedYet);
    };

    let population = state.attempts().submitted_percentages(&attempt.pattern_id).await?;
    let standing = ranking::standing(graded.percentage, &population);
    graded.rank = standing.rank;
    graded.percentile = standing.percentile;

    Ok(graded)
}

/// Watchdog entry point: drives one overdue attempt through the same section
/// transition the client would have reported. Races with client reports and
/// concurrent submits resolve to no-ops.
pub(crate) async fn complete_due_section(
    state: &AppState,
    attempt_id: &str,
) -> Result<bool, AttemptError> {
    let mut retries = 0;
    loop {
        let attempt = state.attempts().get(attempt_id).await?;

        if attempt.status == AttemptStatus::Submitted {
            return Ok(false);
        }

        let now = primitive_now_utc();
        let due = attempt.section_deadline.map(|deadline| deadline <= now).unwrap_or(false);
        if !due {
            return Ok(false);
        }

        match advance_current_section(state, attempt, now).await {
            Ok(_) => return Ok(true),
            Err(AttemptError::Store(StoreError::VersionConflict)) if retries < CAS_MAX_RETRIES => {
                retries += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn fetch_owned(
    state: &AppState,
    owner_id: &str,
    attempt_id: &str,
) -> Result<Attempt, AttemptError> {
    let attempt = state.attempts().get(attempt_id).await?;
    if attempt.owner_id != owner_id {
        // Foreign attempts stay invisible rather than merely forbidden.
        return Err(AttemptError::AttemptNotFound);
    }
    Ok(attempt)
}

async fn advance_current_section(
    state: &AppState,
    mut attempt: Attempt,
    now: PrimitiveDateTime,
) -> Result<Attempt, AttemptError> {
    let current = attempt.current_section_index;
    finalize_section(&mut attempt.sections[current], now);

    if current + 1 < attempt.sections.len() {
        let next = current + 1;
        attempt.current_section_index = next;
        attempt.sections[next].status = SectionStatus::Active;
        attempt.sections[next].activated_at = Some(now);
        attempt.section_deadline =
            Some(section_clock::deadline(now, attempt.sections[next].time_limit_seconds));
        attempt.updated_at = now;

        let saved = state.attempts().update(attempt).await.map_err(AttemptError::Store)?;
        metrics::counter!("sections_completed_total").increment(1);
        tracing::debug!(attempt_id = %saved.id, section = current, "Section completed");
        return Ok(saved);
    }

    grade_and_submit(state, attempt, now).await
}

fn finalize_section(section: &mut SectionState, now: PrimitiveDateTime) {
    let elapsed = section
        .activated_at
        .map(|activated_at| section_clock::elapsed_seconds(activated_at, now))
        .unwrap_or(0);
    section.time_spent_seconds = section_clock::clamp_to_limit(elapsed, section.time_limit_seconds);
    section.status = SectionStatus::Complete;
}

async fn grade_and_submit(
    state: &AppState,
    mut attempt: Attempt,
    now: PrimitiveDateTime,
) -> Result<Attempt, AttemptError> {
    let question_ids: Vec<String> = attempt
        .sections
        .iter()
        .flat_map(|section| section.questions.iter().map(|q| q.question_id.clone()))
        .collect();
    let correct_answers = state.bank().correct_answers(&question_ids).await?;

    let mut graded =
        grading::grade(&mut attempt.sections, &correct_answers, state.settings().scoring());

    let mut population = state.attempts().submitted_percentages(&attempt.pattern_id).await?;
    population.push(graded.percentage);
    let standing = ranking::standing(graded.percentage, &population);
    graded.rank = standing.rank;
    graded.percentile = standing.percentile;

    attempt.status = AttemptStatus::Submitted;
    attempt.completed_at = Some(now);
    attempt.section_deadline = None;
    attempt.graded = Some(graded);
    attempt.updated_at = now;

    let saved = state.attempts().update(attempt).await.map_err(AttemptError::Store)?;

    metrics::counter!("attempts_submitted_total").increment(1);
    tracing::info!(
        attempt_id = %saved.id,
        pattern_id = %saved.pattern_id,
        percentage = saved.graded.as_ref().map(|g| g.percentage).unwrap_or_default(),
        "Attempt submitted and graded"
    );

    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn answer(section: usize, question: usize, selected: Option<&str>) -> AnswerInput {
        AnswerInput {
            section_index: section,
            question_index: question,
            selected_answer: selected.map(|s| s.to_string()),
            time_taken_seconds: 12,
            is_marked_for_review: false,
        }
    }

    #[tokio::test]
    async fn start_clones_the_pattern_skeleton() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);

        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");

        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert_eq!(attempt.current_section_index, 0);
        assert_eq!(attempt.sections.len(), 2);
        assert_eq!(attempt.sections[0].status, SectionStatus::Active);
        assert_eq!(attempt.sections[1].status, SectionStatus::Pending);
        assert!(attempt.section_deadline.is_some());
        assert!(attempt.sections.iter().flat_map(|s| &s.questions).all(|q| {
            q.selected_answer.is_none() && q.is_skipped && q.is_correct.is_none()
        }));
    }

    #[tokio::test]
    async fn start_rejects_unknown_pattern() {
        let ctx = test_support::setup_test_context().await;

        let err = start_attempt(&ctx.state, "u-1", "missing").await.expect_err("missing pattern");
        assert!(matches!(err, AttemptError::DefinitionNotFound));
    }

    #[tokio::test]
    async fn record_answer_is_idempotent() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");

        let first = record_answer(&ctx.state, "u-1", &attempt.id, &answer(0, 0, Some("B")))
            .await
            .expect("first write");
        let second = record_answer(&ctx.state, "u-1", &attempt.id, &answer(0, 0, Some("B")))
            .await
            .expect("second write");

        assert_eq!(first.sections[0].questions[0].selected_answer, Some("B".to_string()));
        assert!(!first.sections[0].questions[0].is_skipped);
        assert_eq!(
            first.sections[0].questions[0].selected_answer,
            second.sections[0].questions[0].selected_answer
        );
        assert_eq!(
            first.sections[0].questions[0].time_taken_seconds,
            second.sections[0].questions[0].time_taken_seconds
        );
    }

    #[tokio::test]
    async fn clearing_an_answer_marks_it_skipped() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");

        record_answer(&ctx.state, "u-1", &attempt.id, &answer(0, 1, Some("A")))
            .await
            .expect("answer");
        let cleared = record_answer(&ctx.state, "u-1", &attempt.id, &answer(0, 1, None))
            .await
            .expect("clear");

        assert_eq!(cleared.sections[0].questions[1].selected_answer, None);
        assert!(cleared.sections[0].questions[1].is_skipped);
    }

    #[tokio::test]
    async fn answers_to_inactive_sections_are_rejected() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");

        let err = record_answer(&ctx.state, "u-1", &attempt.id, &answer(1, 0, Some("D")))
            .await
            .expect_err("inactive section");
        assert!(matches!(err, AttemptError::SectionNotActive));

        let err = record_answer(&ctx.state, "u-1", &attempt.id, &answer(0, 9, Some("D")))
            .await
            .expect_err("bad question index");
        assert!(matches!(err, AttemptError::IndexOutOfRange));
    }

    #[tokio::test]
    async fn complete_section_advances_and_rejects_stale_indices() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");

        let err = complete_section(&ctx.state, "u-1", &attempt.id, 1)
            .await
            .expect_err("future section");
        assert!(matches!(err, AttemptError::SectionNotActive));

        let advanced =
            complete_section(&ctx.state, "u-1", &attempt.id, 0).await.expect("advance");
        assert_eq!(advanced.current_section_index, 1);
        assert_eq!(advanced.sections[0].status, SectionStatus::Complete);
        assert_eq!(advanced.sections[1].status, SectionStatus::Active);
        assert!(advanced.section_deadline.is_some());

        // Duplicate expiry report for the closed section: benign no-op.
        let replay =
            complete_section(&ctx.state, "u-1", &attempt.id, 0).await.expect("duplicate");
        assert_eq!(replay.current_section_index, 1);
        assert_eq!(replay.version, advanced.version);
    }

    #[tokio::test]
    async fn completing_the_last_section_grades_the_attempt() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");

        record_answer(&ctx.state, "u-1", &attempt.id, &answer(0, 0, Some("B")))
            .await
            .expect("answer");
        complete_section(&ctx.state, "u-1", &attempt.id, 0).await.expect("advance");
        let submitted =
            complete_section(&ctx.state, "u-1", &attempt.id, 1).await.expect("finish");

        assert_eq!(submitted.status, AttemptStatus::Submitted);
        assert!(submitted.completed_at.is_some());
        assert!(submitted.section_deadline.is_none());
        let graded = submitted.graded.as_ref().expect("graded");
        assert_eq!(graded.total_score, 1);
        assert_eq!(graded.total_questions, 5);
        assert_eq!(graded.rank, 1);
        assert_eq!(graded.percentile, 100.0);

        // Replaying the final transition returns the attempt unchanged.
        let replay =
            complete_section(&ctx.state, "u-1", &attempt.id, 1).await.expect("replay");
        assert_eq!(replay.version, submitted.version);
        assert_eq!(replay.graded, submitted.graded);
    }

    #[tokio::test]
    async fn submit_cascades_without_granting_time() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");

        let submitted = submit_attempt(&ctx.state, "u-1", &attempt.id).await.expect("submit");

        assert_eq!(submitted.status, AttemptStatus::Submitted);
        for section in &submitted.sections {
            assert_eq!(section.status, SectionStatus::Complete);
            assert!(section.time_spent_seconds >= 0);
            assert!(section.time_spent_seconds <= section.time_limit_seconds);
        }
        // The never-activated second section spent no time at all.
        assert_eq!(submitted.sections[1].time_spent_seconds, 0);

        let err =
            submit_attempt(&ctx.state, "u-1", &attempt.id).await.expect_err("double submit");
        assert!(matches!(err, AttemptError::AlreadySubmitted));
    }

    #[tokio::test]
    async fn answers_after_submission_are_rejected() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");
        submit_attempt(&ctx.state, "u-1", &attempt.id).await.expect("submit");

        let err = record_answer(&ctx.state, "u-1", &attempt.id, &answer(0, 0, Some("B")))
            .await
            .expect_err("write after submit");
        assert!(matches!(err, AttemptError::AlreadySubmitted));
    }

    #[tokio::test]
    async fn graded_result_requires_submission_and_reranks() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);

        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");
        let err =
            graded_result(&ctx.state, "u-1", &attempt.id).await.expect_err("still in progress");
        assert!(matches!(err, AttemptError::NotGradedYet));

        // u-1 answers everything correctly; u-2 submits blank.
        for (question, selected) in [(0, "B"), (1, "A"), (2, "C")] {
            record_answer(&ctx.state, "u-1", &attempt.id, &answer(0, question, Some(selected)))
                .await
                .expect("answer");
        }
        complete_section(&ctx.state, "u-1", &attempt.id, 0).await.expect("advance");
        for (question, selected) in [(0, "D"), (1, "B")] {
            record_answer(&ctx.state, "u-1", &attempt.id, &answer(1, question, Some(selected)))
                .await
                .expect("answer");
        }
        let submitted =
            complete_section(&ctx.state, "u-1", &attempt.id, 1).await.expect("finish");
        assert_eq!(submitted.graded.as_ref().expect("graded").percentage, 100.0);

        let rival = start_attempt(&ctx.state, "u-2", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start rival");
        submit_attempt(&ctx.state, "u-2", &rival.id).await.expect("submit rival");

        let mine = graded_result(&ctx.state, "u-1", &attempt.id).await.expect("result");
        assert_eq!(mine.rank, 1);
        assert_eq!(mine.percentile, 100.0);

        let theirs = graded_result(&ctx.state, "u-2", &rival.id).await.expect("rival result");
        assert_eq!(theirs.rank, 2);
        assert_eq!(theirs.percentile, 0.0);
    }

    #[tokio::test]
    async fn attempts_are_scoped_to_their_owner() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");

        let err = get_attempt(&ctx.state, "u-2", &attempt.id).await.expect_err("foreign read");
        assert!(matches!(err, AttemptError::AttemptNotFound));

        let listed = list_attempts(&ctx.state, "u-1").await.expect("list");
        assert_eq!(listed.len(), 1);
        assert!(list_attempts(&ctx.state, "u-2").await.expect("empty list").is_empty());
    }

    #[tokio::test]
    async fn watchdog_path_ignores_attempts_that_are_not_due() {
        let ctx = test_support::setup_test_context().await;
        test_support::seed_sample_pattern(&ctx);
        let attempt = start_attempt(&ctx.state, "u-1", test_support::SAMPLE_PATTERN_ID)
            .await
            .expect("start");

        let advanced = complete_due_section(&ctx.state, &attempt.id).await.expect("not due");
        assert!(!advanced);

        let current = get_attempt(&ctx.state, "u-1", &attempt.id).await.expect("get");
        assert_eq!(current.current_section_index, 0);
    }
}
