// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::exam::Stage;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub question_id: Uuid,
    pub stage_id: Uuid,

    /// The text content of the question.
    pub question_text: String,

    /// The correct answer key or content.
    pub correct_answer: String,

    /// Explanation of the correct answer, shown on review.
    pub explanation: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'question_options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub option_id: Uuid,
    pub question_id: Uuid,
    pub option_text: String,
}

/// DTO for sending a question to the client.
/// `correct_answer` and `explanation` are withheld when scoring is server verified.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub question_id: Uuid,
    pub stage_id: Uuid,
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub options: Vec<QuestionOption>,
}

impl PublicQuestion {
    pub fn new(question: Question, options: Vec<QuestionOption>, reveal_answer: bool) -> Self {
        let (correct_answer, explanation) = if reveal_answer {
            (Some(question.correct_answer), question.explanation)
        } else {
            (None, None)
        };

        Self {
            question_id: question.question_id,
            stage_id: question.stage_id,
            question_text: question.question_text,
            correct_answer,
            explanation,
            created_at: question.created_at,
            options,
        }
    }
}

/// Stage with its questions and their options.
#[derive(Debug, Serialize)]
pub struct StageDetail {
    #[serde(flatten)]
    pub stage: Stage,
    pub questions: Vec<PublicQuestion>,
}

/// Groups options under their question, keeping the order of `options`.
pub fn options_for(question_id: Uuid, options: &[QuestionOption]) -> Vec<QuestionOption> {
    options
        .iter()
        .filter(|o| o.question_id == question_id)
        .cloned()
        .collect()
}
