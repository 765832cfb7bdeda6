// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Represents the 'instructors' table. Only the name is read by this service.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Instructor {
    pub instructor_id: Uuid,
    pub name: String,
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub exam_id: Uuid,

    /// Exam title shown to students.
    pub name: String,

    pub description: Option<String>,

    /// Only published exams are listed to students.
    pub is_published: bool,

    /// Owning instructor.
    pub created_by: Uuid,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'stages' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Stage {
    pub stage_id: Uuid,
    pub exam_id: Uuid,

    /// 1-based position within the exam; dense and unique per exam.
    pub stage_order: i32,

    /// Minimum percentage (0-100, inclusive) required to unlock the next stage.
    pub passing_score: f64,

    /// Time limit in minutes.
    pub time_limit: i32,
}

/// Row of the published exam listing, joined with instructor and stage aggregates.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub exam: Exam,
    pub instructor_name: String,
    pub stage_count: i64,
    pub total_time_minutes: i64,
}

/// Exam with its stages ordered by `stage_order`.
#[derive(Debug, Serialize)]
pub struct ExamDetail {
    #[serde(flatten)]
    pub exam: Exam,
    pub stages: Vec<Stage>,
}
