use std::collections::HashMap;

use crate::core::config::ScoringSettings;
use crate::db::models::{GradedResult, SectionScore, SectionState};

/// Marks every question in the attempt against the bank's correct answers
/// and rolls the marks up into a graded result. Pure over its inputs;
/// percentile and rank are left at their defaults for the ranking pass.
///
/// A missing or cleared answer is always incorrect. Sections with no
/// questions grade to accuracy 0 rather than dividing by zero.
pub(crate) fn grade(
    sections: &mut [SectionState],
    correct_answers: &HashMap<String, String>,
    scoring: &ScoringSettings,
) -> GradedResult {
    let mut section_scores = Vec::with_capacity(sections.len());
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut total_score: i64 = 0;
    let mut total_questions: i64 = 0;

    for section in sections.iter_mut() {
        let mut score: i64 = 0;

        for question in section.questions.iter_mut() {
            let is_correct = match (&question.selected_answer, correct_answers.get(&question.question_id)) {
                (Some(selected), Some(expected)) => selected == expected,
                _ => false,
            };
            question.is_correct = Some(is_correct);
            if is_correct {
                score += 1;
            }
        }

        let question_count = section.questions.len() as i64;
        let accuracy = if question_count == 0 {
            0.0
        } else {
            score as f64 / question_count as f64 * 100.0
        };

        if accuracy >= scoring.strength_threshold {
            strengths.push(section.name.clone());
        } else if accuracy < scoring.weakness_threshold {
            weaknesses.push(section.name.clone());
        }

        total_score += score;
        total_questions += question_count;

        section_scores.push(SectionScore {
            name: section.name.clone(),
            score,
            total_questions: question_count,
            accuracy,
        });
    }

    let percentage = if total_questions == 0 {
        0.0
    } else {
        total_score as f64 / total_questions as f64 * 100.0
    };

    GradedResult {
        total_score,
        total_questions,
        percentage,
        percentile: 0.0,
        rank: 0,
        strengths,
        weaknesses,
        sections: section_scores,
    }
}
