// src/store/memory.rs

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        answer::{GradedAnswer, ReviewAnswer, StudentAnswer},
        exam::{Exam, ExamSummary, Instructor, Stage},
        progress::StudentStageProgress,
        question::{Question, QuestionOption},
        session::{ExamSession, SessionOverview, SessionStatus},
    },
    store::{ExamStore, SubmissionTx},
};

/// Every table of the gateway. Also the JSON fixture format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryData {
    #[serde(default)]
    pub instructors: Vec<Instructor>,
    #[serde(default)]
    pub exams: Vec<Exam>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub sessions: Vec<ExamSession>,
    #[serde(default)]
    pub answers: Vec<StudentAnswer>,
    #[serde(default)]
    pub progress: Vec<StudentStageProgress>,
}

/// In-process Persistence Gateway.
///
/// A submission transaction holds the lock for its whole lifetime and works on
/// a staged copy, so transactions are serialized and an uncommitted one leaves
/// no trace.
///
/// Meant for tests and local demos: `begin` copies the whole dataset, so every
/// submission costs time proportional to everything stored so far.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: MemoryData) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// Loads a JSON fixture (see `MemoryData`) from disk.
    pub async fn from_fixture(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::InternalServerError(format!("cannot read fixture {}: {}", path.display(), e))
        })?;
        let data: MemoryData = serde_json::from_str(&raw)?;
        tracing::info!(
            "Loaded fixture {}: {} exams, {} stages, {} questions",
            path.display(),
            data.exams.len(),
            data.stages.len(),
            data.questions.len()
        );
        Ok(Self::from_data(data))
    }

    /// Copy of the current committed state.
    pub async fn snapshot(&self) -> MemoryData {
        self.data.lock().await.clone()
    }

    pub async fn insert_instructor(&self, instructor: Instructor) {
        self.data.lock().await.instructors.push(instructor);
    }

    pub async fn insert_exam(&self, exam: Exam) {
        self.data.lock().await.exams.push(exam);
    }

    pub async fn insert_stage(&self, stage: Stage) {
        self.data.lock().await.stages.push(stage);
    }

    pub async fn insert_question(&self, question: Question) {
        self.data.lock().await.questions.push(question);
    }

    pub async fn insert_option(&self, option: QuestionOption) {
        self.data.lock().await.options.push(option);
    }
}

impl MemoryData {
    fn find_in_progress(&self, student_id: Uuid, exam_id: Uuid, stage_order: i32) -> Option<Uuid> {
        self.sessions
            .iter()
            .find(|s| {
                s.student_id == student_id
                    && s.exam_id == exam_id
                    && s.current_stage == stage_order
                    && s.status == SessionStatus::InProgress
            })
            .map(|s| s.session_id)
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn list_published_exams(&self) -> Result<Vec<ExamSummary>, AppError> {
        let data = self.data.lock().await;

        let mut summaries = Vec::new();
        for exam in data.exams.iter().filter(|e| e.is_published) {
            // Inner join on instructors, as in SQL.
            let Some(instructor) = data
                .instructors
                .iter()
                .find(|i| i.instructor_id == exam.created_by)
            else {
                continue;
            };
            let stages: Vec<&Stage> = data
                .stages
                .iter()
                .filter(|s| s.exam_id == exam.exam_id)
                .collect();

            summaries.push(ExamSummary {
                exam: exam.clone(),
                instructor_name: instructor.name.clone(),
                stage_count: stages.len() as i64,
                total_time_minutes: stages.iter().map(|s| s.time_limit as i64).sum(),
            });
        }
        summaries.sort_by(|a, b| b.exam.created_at.cmp(&a.exam.created_at));

        Ok(summaries)
    }

    async fn find_exam(&self, exam_id: Uuid) -> Result<Option<Exam>, AppError> {
        let data = self.data.lock().await;
        Ok(data.exams.iter().find(|e| e.exam_id == exam_id).cloned())
    }

    async fn list_stages(&self, exam_id: Uuid) -> Result<Vec<Stage>, AppError> {
        let data = self.data.lock().await;
        let mut stages: Vec<Stage> = data
            .stages
            .iter()
            .filter(|s| s.exam_id == exam_id)
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.stage_order);
        Ok(stages)
    }

    async fn find_stage(&self, stage_id: Uuid) -> Result<Option<Stage>, AppError> {
        let data = self.data.lock().await;
        Ok(data.stages.iter().find(|s| s.stage_id == stage_id).cloned())
    }

    async fn list_questions(&self, stage_id: Uuid) -> Result<Vec<Question>, AppError> {
        let data = self.data.lock().await;
        let mut questions: Vec<Question> = data
            .questions
            .iter()
            .filter(|q| q.stage_id == stage_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.created_at);
        Ok(questions)
    }

    async fn list_options(&self, question_ids: &[Uuid]) -> Result<Vec<QuestionOption>, AppError> {
        let data = self.data.lock().await;
        let mut options: Vec<QuestionOption> = data
            .options
            .iter()
            .filter(|o| question_ids.contains(&o.question_id))
            .cloned()
            .collect();
        options.sort_by(|a, b| a.option_text.cmp(&b.option_text));
        Ok(options)
    }

    async fn list_student_sessions(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<SessionOverview>, AppError> {
        let data = self.data.lock().await;

        // Reverse first so the stable sort keeps later inserts ahead on equal start times.
        let mut sessions: Vec<SessionOverview> = data
            .sessions
            .iter()
            .rev()
            .filter(|s| s.student_id == student_id)
            .filter_map(|s| {
                let exam = data.exams.iter().find(|e| e.exam_id == s.exam_id)?;
                Some(SessionOverview {
                    session: s.clone(),
                    exam_title: exam.name.clone(),
                    is_published: exam.is_published,
                })
            })
            .collect();
        sessions.sort_by(|a, b| b.session.start_time.cmp(&a.session.start_time));

        Ok(sessions)
    }

    async fn list_exam_sessions(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<ExamSession>, AppError> {
        let data = self.data.lock().await;
        Ok(data
            .sessions
            .iter()
            .filter(|s| s.exam_id == exam_id && s.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn latest_completed_session(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<ExamSession>, AppError> {
        let data = self.data.lock().await;
        // `max_by_key` keeps the last of equal keys, i.e. the latest insert.
        Ok(data
            .sessions
            .iter()
            .filter(|s| {
                s.student_id == student_id
                    && s.exam_id == exam_id
                    && s.status == SessionStatus::Completed
            })
            .max_by_key(|s| s.end_time)
            .cloned())
    }

    async fn list_review_answers(
        &self,
        session_id: Uuid,
        stage_id: Uuid,
    ) -> Result<Vec<ReviewAnswer>, AppError> {
        let data = self.data.lock().await;

        let mut rows: Vec<(Option<chrono::DateTime<Utc>>, ReviewAnswer)> = data
            .answers
            .iter()
            .filter(|a| a.session_id == session_id)
            .filter_map(|a| {
                let question = data
                    .questions
                    .iter()
                    .find(|q| q.question_id == a.question_id && q.stage_id == stage_id)?;
                Some((
                    question.created_at,
                    ReviewAnswer {
                        answer: a.clone(),
                        stage_id: question.stage_id,
                        question_text: question.question_text.clone(),
                        correct_answer: question.correct_answer.clone(),
                        explanation: question.explanation.clone(),
                    },
                ))
            })
            .collect();
        rows.sort_by_key(|(created_at, _)| *created_at);

        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn find_stage_progress(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<i32>, AppError> {
        let data = self.data.lock().await;
        Ok(data
            .progress
            .iter()
            .find(|p| p.student_id == student_id && p.exam_id == exam_id)
            .map(|p| p.current_stage_order))
    }

    async fn begin(&self) -> Result<Box<dyn SubmissionTx>, AppError> {
        let guard = self.data.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemorySubmissionTx { guard, staged }))
    }
}

pub struct MemorySubmissionTx {
    guard: OwnedMutexGuard<MemoryData>,
    staged: MemoryData,
}

#[async_trait]
impl SubmissionTx for MemorySubmissionTx {
    async fn find_in_progress_session(
        &mut self,
        student_id: Uuid,
        exam_id: Uuid,
        stage_order: i32,
    ) -> Result<Option<Uuid>, AppError> {
        Ok(self.staged.find_in_progress(student_id, exam_id, stage_order))
    }

    async fn insert_session_if_absent(
        &mut self,
        student_id: Uuid,
        exam_id: Uuid,
        stage_order: i32,
    ) -> Result<Option<Uuid>, AppError> {
        if self
            .staged
            .find_in_progress(student_id, exam_id, stage_order)
            .is_some()
        {
            return Ok(None);
        }

        let session_id = Uuid::new_v4();
        self.staged.sessions.push(ExamSession {
            session_id,
            student_id,
            exam_id,
            current_stage: stage_order,
            status: SessionStatus::InProgress,
            start_time: Utc::now(),
            end_time: None,
        });
        Ok(Some(session_id))
    }

    async fn upsert_answers(
        &mut self,
        session_id: Uuid,
        answers: &[GradedAnswer],
    ) -> Result<(), AppError> {
        let now = Utc::now();
        for answer in answers {
            let existing = self
                .staged
                .answers
                .iter_mut()
                .find(|a| a.session_id == session_id && a.question_id == answer.question_id);

            match existing {
                Some(row) => {
                    row.selected_answer = answer.selected_answer.clone();
                    row.is_correct = answer.is_correct;
                    row.answered_at = now;
                }
                None => self.staged.answers.push(StudentAnswer {
                    session_id,
                    question_id: answer.question_id,
                    selected_answer: answer.selected_answer.clone(),
                    is_correct: answer.is_correct,
                    answered_at: now,
                }),
            }
        }
        Ok(())
    }

    async fn complete_session(&mut self, session_id: Uuid) -> Result<bool, AppError> {
        let session = self
            .staged
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id && s.status == SessionStatus::InProgress);

        match session {
            Some(session) => {
                session.status = SessionStatus::Completed;
                session.end_time = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn max_stage_order(&mut self, exam_id: Uuid) -> Result<Option<i32>, AppError> {
        Ok(self
            .staged
            .stages
            .iter()
            .filter(|s| s.exam_id == exam_id)
            .map(|s| s.stage_order)
            .max())
    }

    async fn advance_progress(
        &mut self,
        student_id: Uuid,
        exam_id: Uuid,
        candidate: i32,
    ) -> Result<i32, AppError> {
        let existing = self
            .staged
            .progress
            .iter_mut()
            .find(|p| p.student_id == student_id && p.exam_id == exam_id);

        match existing {
            Some(row) => {
                row.current_stage_order = row.current_stage_order.max(candidate);
                Ok(row.current_stage_order)
            }
            None => {
                self.staged.progress.push(StudentStageProgress {
                    student_id,
                    exam_id,
                    current_stage_order: candidate,
                });
                Ok(candidate)
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemorySubmissionTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(question_id: Uuid, selected: &str, is_correct: bool) -> GradedAnswer {
        GradedAnswer {
            question_id,
            selected_answer: selected.to_string(),
            is_correct,
        }
    }

    #[tokio::test]
    async fn test_answer_upsert_keeps_one_row_with_latest_selection() {
        let store = MemoryStore::new();
        let (student, exam, question) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        let session = tx
            .insert_session_if_absent(student, exam, 1)
            .await
            .unwrap()
            .unwrap();
        tx.upsert_answers(session, &[graded(question, "A", false)])
            .await
            .unwrap();
        tx.upsert_answers(session, &[graded(question, "B", true)])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let data = store.snapshot().await;
        assert_eq!(data.answers.len(), 1);
        assert_eq!(data.answers[0].selected_answer, "B");
        assert!(data.answers[0].is_correct);
    }

    #[tokio::test]
    async fn test_second_in_progress_session_is_rejected() {
        let store = MemoryStore::new();
        let (student, exam) = (Uuid::new_v4(), Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_session_if_absent(student, exam, 2).await.unwrap();
        let second = tx.insert_session_if_absent(student, exam, 2).await.unwrap();
        let other_stage = tx.insert_session_if_absent(student, exam, 3).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(other_stage.is_some());
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        let (student, exam) = (Uuid::new_v4(), Uuid::new_v4());

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_session_if_absent(student, exam, 1).await.unwrap();
            tx.advance_progress(student, exam, 2).await.unwrap();
            // dropped without commit
        }

        let data = store.snapshot().await;
        assert!(data.sessions.is_empty());
        assert!(data.progress.is_empty());
        assert_eq!(store.find_stage_progress(student, exam).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_complete_session_only_once() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let session = tx
            .insert_session_if_absent(Uuid::new_v4(), Uuid::new_v4(), 1)
            .await
            .unwrap()
            .unwrap();

        assert!(tx.complete_session(session).await.unwrap());
        assert!(!tx.complete_session(session).await.unwrap());
        assert!(!tx.complete_session(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_fixture_round_trip_from_json() {
        let raw = serde_json::json!({
            "instructors": [{ "instructor_id": Uuid::nil(), "name": "Dr. Ada" }],
            "exams": [{
                "exam_id": Uuid::from_u128(1),
                "name": "Networks",
                "description": null,
                "is_published": true,
                "created_by": Uuid::nil(),
                "created_at": null
            }],
            "stages": [{
                "stage_id": Uuid::from_u128(2),
                "exam_id": Uuid::from_u128(1),
                "stage_order": 1,
                "passing_score": 50.0,
                "time_limit": 15
            }]
        });
        let data: MemoryData = serde_json::from_value(raw).unwrap();
        let store = MemoryStore::from_data(data);

        let exams = store.list_published_exams().await.unwrap();
        assert_eq!(exams.len(), 1);
        assert_eq!(exams[0].instructor_name, "Dr. Ada");
        assert_eq!(exams[0].stage_count, 1);
        assert_eq!(exams[0].total_time_minutes, 15);
    }
}
