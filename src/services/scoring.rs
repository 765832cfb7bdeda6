// src/services/scoring.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    config::ScoringMode,
    error::AppError,
    models::{
        answer::{GradedAnswer, SubmittedAnswer},
        question::Question,
    },
};

/// Outcome of scoring one stage submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageScore {
    pub correct_count: usize,
    pub total_questions: usize,
    pub score_percentage: f64,
    pub passed: bool,
}

/// Settles the correctness flag of every submitted answer.
///
/// * Answers to questions outside the stage are dropped and never counted.
/// * When a question is answered twice in one submission the last answer wins.
/// * In `ClientReported` mode the client flag is kept; in `ServerVerified`
///   mode it is replaced by a strict comparison with the stored answer.
pub fn grade_answers(
    questions: &[Question],
    answers: &[SubmittedAnswer],
    mode: ScoringMode,
) -> Vec<GradedAnswer> {
    let answer_keys: HashMap<Uuid, &str> = questions
        .iter()
        .map(|q| (q.question_id, q.correct_answer.as_str()))
        .collect();

    let mut graded: Vec<GradedAnswer> = Vec::with_capacity(answers.len());
    for answer in answers {
        let Some(correct_answer) = answer_keys.get(&answer.question_id) else {
            tracing::debug!(
                "Ignoring answer to question {} outside the stage",
                answer.question_id
            );
            continue;
        };

        let is_correct = match mode {
            ScoringMode::ClientReported => answer.is_correct,
            ScoringMode::ServerVerified => answer.selected_answer == *correct_answer,
        };

        let entry = GradedAnswer {
            question_id: answer.question_id,
            selected_answer: answer.selected_answer.clone(),
            is_correct,
        };

        match graded.iter_mut().find(|g| g.question_id == answer.question_id) {
            Some(previous) => *previous = entry,
            None => graded.push(entry),
        }
    }

    graded
}

/// Computes the percentage score against the full question count of the stage.
///
/// Unanswered questions count as wrong. The pass threshold is inclusive.
/// A stage without questions cannot be scored and is reported as an invariant violation.
pub fn score_stage(
    total_questions: usize,
    graded: &[GradedAnswer],
    passing_score: f64,
) -> Result<StageScore, AppError> {
    if total_questions == 0 {
        return Err(AppError::InvariantViolation(
            "cannot score a stage with no questions".to_string(),
        ));
    }

    let correct_count = graded.iter().filter(|a| a.is_correct).count();
    let score_percentage = (correct_count as f64 / total_questions as f64) * 100.0;

    Ok(StageScore {
        correct_count,
        total_questions,
        score_percentage,
        passed: score_percentage >= passing_score,
    })
}
