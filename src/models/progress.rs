// src/models/progress.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the 'student_stage_progress' table. One row per (student, exam).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentStageProgress {
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub current_stage_order: i32,
}

/// Response body of the stage-progress query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    /// Highest stage the student may enter. 1 when nothing has been passed yet.
    pub current_stage_order: i32,
}

/// Result of a stage submission, echoed back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub success: bool,
    pub session_id: Uuid,
    pub score: f64,
    pub correct_count: usize,
    pub total_questions: usize,
    pub passed: bool,
    /// Unlocked stage after this submission (unchanged when the stage was failed).
    pub current_stage_order: i32,
}
