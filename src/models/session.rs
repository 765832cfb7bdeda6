// src/models/session.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of an exam session. Moves `InProgress -> Completed` once and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

/// Represents the 'exam_sessions' table: one attempt at one stage by one student.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamSession {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,

    /// The `stage_order` being attempted.
    pub current_stage: i32,

    pub status: SessionStatus,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Session joined with the title and publication flag of its exam.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SessionOverview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub session: ExamSession,
    pub exam_title: String,
    pub is_published: bool,
}
