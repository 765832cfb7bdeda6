// src/store/mod.rs

//! Persistence Gateway.
//!
//! `ExamStore` is the read side plus the entry point of the submission
//! transaction. `SubmissionTx` carries the write path of a stage submission;
//! dropping it without calling `commit` discards every write made through it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        answer::{GradedAnswer, ReviewAnswer},
        exam::{Exam, ExamSummary, Stage},
        question::{Question, QuestionOption},
        session::{ExamSession, SessionOverview},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ExamStore: Send + Sync {
    /// Published exams with instructor name and stage aggregates.
    async fn list_published_exams(&self) -> Result<Vec<ExamSummary>, AppError>;

    async fn find_exam(&self, exam_id: Uuid) -> Result<Option<Exam>, AppError>;

    /// Stages of an exam ordered by `stage_order`.
    async fn list_stages(&self, exam_id: Uuid) -> Result<Vec<Stage>, AppError>;

    async fn find_stage(&self, stage_id: Uuid) -> Result<Option<Stage>, AppError>;

    /// Questions of a stage ordered by creation time.
    async fn list_questions(&self, stage_id: Uuid) -> Result<Vec<Question>, AppError>;

    async fn list_options(&self, question_ids: &[Uuid]) -> Result<Vec<QuestionOption>, AppError>;

    /// All sessions of a student, newest `start_time` first.
    async fn list_student_sessions(&self, student_id: Uuid)
    -> Result<Vec<SessionOverview>, AppError>;

    async fn list_exam_sessions(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<ExamSession>, AppError>;

    /// Most recently ended completed session of a student for an exam.
    async fn latest_completed_session(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<ExamSession>, AppError>;

    /// Answers of a session restricted to the questions of one stage.
    async fn list_review_answers(
        &self,
        session_id: Uuid,
        stage_id: Uuid,
    ) -> Result<Vec<ReviewAnswer>, AppError>;

    /// Raw progress row value; `None` when no stage has been passed yet.
    async fn find_stage_progress(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<i32>, AppError>;

    async fn begin(&self) -> Result<Box<dyn SubmissionTx>, AppError>;
}

#[async_trait]
pub trait SubmissionTx: Send {
    async fn find_in_progress_session(
        &mut self,
        student_id: Uuid,
        exam_id: Uuid,
        stage_order: i32,
    ) -> Result<Option<Uuid>, AppError>;

    /// Inserts an in_progress session unless one already exists for the
    /// triple. Returns `None` when the uniqueness constraint rejected it.
    async fn insert_session_if_absent(
        &mut self,
        student_id: Uuid,
        exam_id: Uuid,
        stage_order: i32,
    ) -> Result<Option<Uuid>, AppError>;

    /// Upserts keyed by (session, question); existing rows get the new
    /// selection, flag and timestamp.
    async fn upsert_answers(
        &mut self,
        session_id: Uuid,
        answers: &[GradedAnswer],
    ) -> Result<(), AppError>;

    /// Flips an in_progress session to completed. Returns false when no
    /// in_progress session has that id.
    async fn complete_session(&mut self, session_id: Uuid) -> Result<bool, AppError>;

    async fn max_stage_order(&mut self, exam_id: Uuid) -> Result<Option<i32>, AppError>;

    /// Atomic max-upsert of the progress row. Returns the stored value.
    async fn advance_progress(
        &mut self,
        student_id: Uuid,
        exam_id: Uuid,
        candidate: i32,
    ) -> Result<i32, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
