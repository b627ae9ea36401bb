use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{Attempt, GradedResult, QuestionState, SectionState};
use crate::db::types::{AttemptStatus, SectionStatus};
use crate::services::section_clock;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StartAttemptRequest {
    #[serde(alias = "patternId")]
    #[validate(length(min = 1, message = "pattern_id must not be empty"))]
    pub(crate) pattern_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RecordAnswerRequest {
    #[serde(alias = "sectionIndex")]
    #[validate(range(min = 0, message = "section_index must be non-negative"))]
    pub(crate) section_index: i32,
    #[serde(alias = "questionIndex")]
    #[validate(range(min = 0, message = "question_index must be non-negative"))]
    pub(crate) question_index: i32,
    #[serde(default)]
    #[serde(alias = "selectedAnswer")]
    pub(crate) selected_answer: Option<String>,
    #[serde(default)]
    #[serde(alias = "timeTakenSeconds")]
    #[validate(range(min = 0, message = "time_taken_seconds must be non-negative"))]
    pub(crate) time_taken_seconds: i64,
    #[serde(default)]
    #[serde(alias = "isMarkedForReview")]
    pub(crate) is_marked_for_review: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) pattern_id: String,
    pub(crate) owner_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) current_section_index: usize,
    pub(crate) started_at: String,
    pub(crate) completed_at: Option<String>,
    pub(crate) sections: Vec<SectionStateResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionStateResponse {
    pub(crate) name: String,
    pub(crate) status: SectionStatus,
    pub(crate) time_limit_seconds: i64,
    pub(crate) time_spent_seconds: i64,
    /// Live countdown for the active section only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) remaining_seconds: Option<i64>,
    pub(crate) questions: Vec<QuestionStateResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionStateResponse {
    pub(crate) question_id: String,
    pub(crate) selected_answer: Option<String>,
    pub(crate) is_marked_for_review: bool,
    pub(crate) is_skipped: bool,
    pub(crate) time_taken_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptSummaryResponse {
    pub(crate) id: String,
    pub(crate) pattern_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) percentage: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionScoreResponse {
    pub(crate) name: String,
    pub(crate) score: i64,
    pub(crate) total_questions: i64,
    pub(crate) accuracy: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradedResultResponse {
    pub(crate) attempt_id: String,
    pub(crate) total_score: i64,
    pub(crate) total_questions: i64,
    pub(crate) percentage: f64,
    pub(crate) percentile: f64,
    pub(crate) rank: i64,
    pub(crate) strengths: Vec<String>,
    pub(crate) weaknesses: Vec<String>,
    pub(crate) sections: Vec<SectionScoreResponse>,
}

/// Correctness marks stay server-side until the attempt is submitted.
pub(crate) fn attempt_to_response(attempt: &Attempt, now: PrimitiveDateTime) -> AttemptResponse {
    let reveal_correctness = attempt.status == AttemptStatus::Submitted;

    AttemptResponse {
        id: attempt.id.clone(),
        pattern_id: attempt.pattern_id.clone(),
        owner_id: attempt.owner_id.clone(),
        status: attempt.status,
        current_section_index: attempt.current_section_index,
        started_at: format_primitive(attempt.started_at),
        completed_at: attempt.completed_at.map(format_primitive),
        sections: attempt
            .sections
            .iter()
            .map(|section| section_to_response(section, now, reveal_correctness))
            .collect(),
    }
}

fn section_to_response(
    section: &SectionState,
    now: PrimitiveDateTime,
    reveal_correctness: bool,
) -> SectionStateResponse {
    let remaining_seconds = match (section.status, section.activated_at) {
        (SectionStatus::Active, Some(activated_at)) => Some(section_clock::remaining_seconds(
            section.time_limit_seconds,
            section_clock::elapsed_seconds(activated_at, now),
        )),
        _ => None,
    };

    SectionStateResponse {
        name: section.name.clone(),
        status: section.status,
        time_limit_seconds: section.time_limit_seconds,
        time_spent_seconds: section.time_spent_seconds,
        remaining_seconds,
        questions: section
            .questions
            .iter()
            .map(|question| question_to_response(question, reveal_correctness))
            .collect(),
    }
}

fn question_to_response(
    question: &QuestionState,
    reveal_correctness: bool,
) -> QuestionStateResponse {
    QuestionStateResponse {
        question_id: question.question_id.clone(),
        selected_answer: question.selected_answer.clone(),
        is_marked_for_review: question.is_marked_for_review,
        is_skipped: question.is_skipped,
        time_taken_seconds: question.time_taken_seconds,
        is_correct: if reveal_correctness { question.is_correct } else { None },
    }
}

pub(crate) fn attempt_to_summary(attempt: &Attempt) -> AttemptSummaryResponse {
    AttemptSummaryResponse {
        id: attempt.id.clone(),
        pattern_id: attempt.pattern_id.clone(),
        status: attempt.status,
        started_at: format_primitive(attempt.started_at),
        completed_at: attempt.completed_at.map(format_primitive),
        percentage: attempt.graded.as_ref().map(|graded| graded.percentage),
    }
}

pub(crate) fn graded_to_response(attempt_id: &str, graded: &GradedResult) -> GradedResultResponse {
    GradedResultResponse {
        attempt_id: attempt_id.to_string(),
        total_score: graded.total_score,
        total_questions: graded.total_questions,
        percentage: graded.percentage,
        percentile: graded.percentile,
        rank: graded.rank,
        strengths: graded.strengths.clone(),
        weaknesses: graded.weaknesses.clone(),
        sections: graded
            .sections
            .iter()
            .map(|section| SectionScoreResponse {
                name: section.name.clone(),
                score: section.score,
                total_questions: section.total_questions,
                accuracy: section.accuracy,
            })
            .collect(),
    }
}
