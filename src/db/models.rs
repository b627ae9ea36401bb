use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptStatus, Difficulty, SectionStatus};

/// Immutable test definition owned by the content platform. Section order is
/// fixed; an attempt clones this skeleton at start and never re-reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TestPattern {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) cutoff_percentage: f64,
    pub(crate) sections: Vec<SectionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SectionSpec {
    pub(crate) name: String,
    pub(crate) question_ids: Vec<String>,
    pub(crate) time_limit_seconds: i64,
}

/// Display metadata for one question. The correct answer is deliberately not
/// part of this struct; it travels only through `QuestionBank::correct_answers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QuestionMeta {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) options: Vec<String>,
    pub(crate) difficulty: Difficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) pattern_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) current_section_index: usize,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    /// Wall-clock deadline of the ACTIVE section; None once submitted.
    pub(crate) section_deadline: Option<PrimitiveDateTime>,
    pub(crate) sections: Vec<SectionState>,
    pub(crate) graded: Option<GradedResult>,
    pub(crate) version: i64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SectionState {
    pub(crate) name: String,
    pub(crate) time_limit_seconds: i64,
    pub(crate) time_spent_seconds: i64,
    pub(crate) status: SectionStatus,
    pub(crate) activated_at: Option<PrimitiveDateTime>,
    pub(crate) questions: Vec<QuestionState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QuestionState {
    pub(crate) question_id: String,
    pub(crate) selected_answer: Option<String>,
    pub(crate) is_marked_for_review: bool,
    pub(crate) is_skipped: bool,
    pub(crate) time_taken_seconds: i64,
    pub(crate) is_correct: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SectionScore {
    pub(crate) name: String,
    pub(crate) score: i64,
    pub(crate) total_questions: i64,
    pub(crate) accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GradedResult {
    pub(crate) total_score: i64,
    pub(crate) total_questions: i64,
    pub(crate) percentage: f64,
    pub(crate) percentile: f64,
    pub(crate) rank: i64,
    pub(crate) strengths: Vec<String>,
    pub(crate) weaknesses: Vec<String>,
    pub(crate) sections: Vec<SectionScore>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AttemptRow {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) pattern_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) current_section_index: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) section_deadline: Option<PrimitiveDateTime>,
    pub(crate) sections: Json<Vec<SectionState>>,
    pub(crate) graded: Option<Json<GradedResult>>,
    pub(crate) version: i64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl From<AttemptRow> for Attempt {
    fn from(row: AttemptRow) -> Self {
        Attempt {
            id: row.id,
            owner_id: row.owner_id,
            pattern_id: row.pattern_id,
            status: row.status,
            current_section_index: row.current_section_index.max(0) as usize,
            started_at: row.started_at,
            completed_at: row.completed_at,
            section_deadline: row.section_deadline,
            sections: row.sections.0,
            graded: row.graded.map(|json| json.0),
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PatternRow {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) cutoff_percentage: f64,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SectionRow {
    pub(crate) pattern_id: String,
    pub(crate) name: String,
    pub(crate) order_index: i32,
    pub(crate) time_limit_seconds: i64,
    pub(crate) question_ids: Json<Vec<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct QuestionRow {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) options: Json<Vec<String>>,
    pub(crate) correct_answer: String,
    pub(crate) difficulty: Difficulty,
}
