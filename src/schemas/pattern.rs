use std::collections::HashMap;

use serde::Serialize;

use crate::db::models::{QuestionMeta, TestPattern};
use crate::db::types::Difficulty;

#[derive(Debug, Serialize)]
pub(crate) struct PatternResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) cutoff_percentage: f64,
    pub(crate) total_questions: usize,
    pub(crate) total_time_seconds: i64,
    pub(crate) sections: Vec<SectionSpecResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionSpecResponse {
    pub(crate) name: String,
    pub(crate) time_limit_seconds: i64,
    pub(crate) question_count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct PatternDetailResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) cutoff_percentage: f64,
    pub(crate) sections: Vec<SectionDetailResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionDetailResponse {
    pub(crate) name: String,
    pub(crate) time_limit_seconds: i64,
    pub(crate) questions: Vec<QuestionMetaResponse>,
}

/// Display shape only. Correct answers never ride along with question text.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionMetaResponse {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) options: Vec<String>,
    pub(crate) difficulty: Difficulty,
}

pub(crate) fn pattern_to_response(pattern: &TestPattern) -> PatternResponse {
    PatternResponse {
        id: pattern.id.clone(),
        name: pattern.name.clone(),
        cutoff_percentage: pattern.cutoff_percentage,
        total_questions: pattern.sections.iter().map(|s| s.question_ids.len()).sum(),
        total_time_seconds: pattern.sections.iter().map(|s| s.time_limit_seconds).sum(),
        sections: pattern
            .sections
            .iter()
            .map(|section| SectionSpecResponse {
                name: section.name.clone(),
                time_limit_seconds: section.time_limit_seconds,
                question_count: section.question_ids.len(),
            })
            .collect(),
    }
}

pub(crate) fn pattern_to_detail(
    pattern: &TestPattern,
    meta: &HashMap<String, QuestionMeta>,
) -> PatternDetailResponse {
    PatternDetailResponse {
        id: pattern.id.clone(),
        name: pattern.name.clone(),
        cutoff_percentage: pattern.cutoff_percentage,
        sections: pattern
            .sections
            .iter()
            .map(|section| SectionDetailResponse {
                name: section.name.clone(),
                time_limit_seconds: section.time_limit_seconds,
                questions: section
                    .question_ids
                    .iter()
                    .filter_map(|id| meta.get(id))
                    .map(|question| QuestionMetaResponse {
                        id: question.id.clone(),
                        text: question.text.clone(),
                        options: question.options.clone(),
                        difficulty: question.difficulty,
                    })
                    .collect(),
            })
            .collect(),
    }
}
