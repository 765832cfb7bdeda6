// src/models/answer.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::{question::QuestionOption, session::ExamSession};

/// One answer inside a stage submission.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: Uuid,

    #[validate(length(max = 500))]
    pub selected_answer: String,

    /// Correctness as judged by the client. Only trusted in client-reported scoring mode.
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for submitting the answers of one stage.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitStageRequest {
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub stage_id: Uuid,

    #[validate(length(max = 500))]
    #[validate(nested)]
    pub answers: Vec<SubmittedAnswer>,
}

/// Answer whose correctness flag has been settled and is ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub question_id: Uuid,
    pub selected_answer: String,
    pub is_correct: bool,
}

/// Represents the 'student_answers' table. Unique per (session_id, question_id).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudentAnswer {
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub selected_answer: String,
    pub is_correct: bool,
    pub answered_at: chrono::DateTime<chrono::Utc>,
}

/// Stored answer joined with the question it answers.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReviewAnswer {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub answer: StudentAnswer,
    pub stage_id: Uuid,
    pub question_text: String,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

/// Review answer with the options of its question attached.
#[derive(Debug, Serialize)]
pub struct ReviewAnswerDetail {
    #[serde(flatten)]
    pub answer: ReviewAnswer,
    pub options: Vec<QuestionOption>,
}

/// Query parameters of the review endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewParams {
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub stage_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse<A> {
    pub session: ExamSession,
    pub answers: Vec<A>,
}
