// src/services/submission.rs

use std::fmt;

use crate::{
    config::ScoringMode,
    error::AppError,
    models::{answer::SubmitStageRequest, progress::SubmissionOutcome},
    services::{
        progress::{self, next_stage_candidate},
        scoring::{grade_answers, score_stage},
        session::{complete_session, resolve_session},
    },
    store::ExamStore,
};

/// States of a stage submission, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStep {
    LoadingStage,
    LoadingQuestions,
    ResolvingSession,
    PersistingAnswers,
    CompletingSession,
    Scoring,
    AdvancingProgress,
    Done,
}

impl fmt::Display for SubmissionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionStep::LoadingStage => "loading_stage",
            SubmissionStep::LoadingQuestions => "loading_questions",
            SubmissionStep::ResolvingSession => "resolving_session",
            SubmissionStep::PersistingAnswers => "persisting_answers",
            SubmissionStep::CompletingSession => "completing_session",
            SubmissionStep::Scoring => "scoring",
            SubmissionStep::AdvancingProgress => "advancing_progress",
            SubmissionStep::Done => "done",
        };
        f.write_str(name)
    }
}

fn enter(step: SubmissionStep, req: &SubmitStageRequest) {
    tracing::debug!(
        step = %step,
        student_id = %req.student_id,
        stage_id = %req.stage_id,
        "submit-stage"
    );
}

/// Runs a stage submission end to end.
///
/// * Stage and questions are loaded and the answers validated before anything is written.
/// * Session resolution, answer upserts, completion and the progress advance share one
///   store transaction; an error at any point drops it uncommitted.
/// * Progress only moves when the stage is passed, to at most `max stage + 1`.
pub async fn submit_stage(
    store: &dyn ExamStore,
    scoring_mode: ScoringMode,
    req: &SubmitStageRequest,
) -> Result<SubmissionOutcome, AppError> {
    enter(SubmissionStep::LoadingStage, req);
    let stage = store
        .find_stage(req.stage_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid stageId".to_string()))?;

    if stage.exam_id != req.exam_id {
        return Err(AppError::BadRequest(
            "Stage does not belong to this exam".to_string(),
        ));
    }

    enter(SubmissionStep::LoadingQuestions, req);
    let questions = store.list_questions(stage.stage_id).await?;
    if questions.is_empty() {
        return Err(AppError::InvariantViolation(format!(
            "stage {} has no questions",
            stage.stage_id
        )));
    }
    let graded = grade_answers(&questions, &req.answers, scoring_mode);

    let mut tx = store.begin().await?;

    enter(SubmissionStep::ResolvingSession, req);
    let session_id =
        resolve_session(tx.as_mut(), req.student_id, stage.exam_id, stage.stage_order).await?;

    enter(SubmissionStep::PersistingAnswers, req);
    tx.upsert_answers(session_id, &graded).await?;

    enter(SubmissionStep::CompletingSession, req);
    complete_session(tx.as_mut(), session_id).await?;

    enter(SubmissionStep::Scoring, req);
    let score = score_stage(questions.len(), &graded, stage.passing_score)?;

    let mut unlocked = None;
    if score.passed {
        enter(SubmissionStep::AdvancingProgress, req);
        let max_stage_order = tx
            .max_stage_order(stage.exam_id)
            .await?
            .unwrap_or(stage.stage_order);
        let candidate = next_stage_candidate(stage.stage_order, max_stage_order);
        unlocked =
            Some(progress::advance(tx.as_mut(), req.student_id, stage.exam_id, candidate).await?);
    }

    tx.commit().await?;
    enter(SubmissionStep::Done, req);

    let current_stage_order = match unlocked {
        Some(stage_order) => stage_order,
        None => progress::unlocked_stage(store, req.student_id, stage.exam_id).await?,
    };

    tracing::info!(
        "Student {} submitted stage {} of exam {}: {:.1}% ({}/{}), passed={}",
        req.student_id,
        stage.stage_order,
        stage.exam_id,
        score.score_percentage,
        score.correct_count,
        score.total_questions,
        score.passed
    );

    Ok(SubmissionOutcome {
        success: true,
        session_id,
        score: score.score_percentage,
        correct_count: score.correct_count,
        total_questions: score.total_questions,
        passed: score.passed,
        current_stage_order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            answer::{GradedAnswer, ReviewAnswer, SubmittedAnswer},
            exam::{Exam, ExamSummary, Stage},
            question::{Question, QuestionOption},
            session::{ExamSession, SessionOverview, SessionStatus},
        },
        store::{MemoryStore, SubmissionTx},
    };
    use async_trait::async_trait;
    use uuid::Uuid;

    struct Fixture {
        store: MemoryStore,
        exam_id: Uuid,
        stages: Vec<Stage>,
        questions: Vec<Vec<Question>>,
    }

    /// Exam with `stages` stages of `per_stage` questions each, all answered "A".
    async fn fixture(stages: i32, per_stage: usize, passing_score: f64) -> Fixture {
        let store = MemoryStore::new();
        let exam_id = Uuid::new_v4();
        store
            .insert_exam(Exam {
                exam_id,
                name: "Operating Systems".to_string(),
                description: None,
                is_published: true,
                created_by: Uuid::new_v4(),
                created_at: None,
            })
            .await;

        let mut all_stages = Vec::new();
        let mut all_questions = Vec::new();
        for order in 1..=stages {
            let stage = Stage {
                stage_id: Uuid::new_v4(),
                exam_id,
                stage_order: order,
                passing_score,
                time_limit: 10,
            };
            store.insert_stage(stage.clone()).await;

            let mut questions = Vec::new();
            for i in 0..per_stage {
                let question = Question {
                    question_id: Uuid::new_v4(),
                    stage_id: stage.stage_id,
                    question_text: format!("Stage {} question {}", order, i),
                    correct_answer: "A".to_string(),
                    explanation: None,
                    created_at: None,
                };
                store.insert_question(question.clone()).await;
                questions.push(question);
            }
            all_stages.push(stage);
            all_questions.push(questions);
        }

        Fixture {
            store,
            exam_id,
            stages: all_stages,
            questions: all_questions,
        }
    }

    fn request(
        fx: &Fixture,
        student_id: Uuid,
        stage_index: usize,
        correct: usize,
    ) -> SubmitStageRequest {
        let answers = fx.questions[stage_index]
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let is_correct = i < correct;
                SubmittedAnswer {
                    question_id: q.question_id,
                    selected_answer: if is_correct { "A" } else { "B" }.to_string(),
                    is_correct,
                }
            })
            .collect();

        SubmitStageRequest {
            student_id,
            exam_id: fx.exam_id,
            stage_id: fx.stages[stage_index].stage_id,
            answers,
        }
    }

    #[tokio::test]
    async fn test_perfect_first_stage_unlocks_second() {
        let fx = fixture(3, 5, 60.0).await;
        let student = Uuid::new_v4();

        let outcome = submit_stage(
            &fx.store,
            ScoringMode::ClientReported,
            &request(&fx, student, 0, 5),
        )
        .await
        .unwrap();

        assert!(outcome.success);
        assert!(outcome.passed);
        assert_eq!(outcome.score, 100.0);
        assert_eq!(outcome.current_stage_order, 2);

        let data = fx.store.snapshot().await;
        assert_eq!(data.sessions.len(), 1);
        assert_eq!(data.sessions[0].status, SessionStatus::Completed);
        assert!(data.sessions[0].end_time.is_some());
        assert_eq!(data.answers.len(), 5);
        assert_eq!(
            progress::unlocked_stage(&fx.store, student, fx.exam_id)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_failed_stage_keeps_progress() {
        let fx = fixture(3, 4, 80.0).await;
        let student = Uuid::new_v4();

        let outcome = submit_stage(
            &fx.store,
            ScoringMode::ClientReported,
            &request(&fx, student, 0, 3),
        )
        .await
        .unwrap();

        assert_eq!(outcome.score, 75.0);
        assert!(!outcome.passed);
        assert_eq!(outcome.current_stage_order, 1);
        assert!(fx.store.snapshot().await.progress.is_empty());
    }

    #[tokio::test]
    async fn test_final_stage_caps_at_max_plus_one() {
        let fx = fixture(3, 2, 50.0).await;
        let student = Uuid::new_v4();

        for stage_index in [2, 2, 0] {
            submit_stage(
                &fx.store,
                ScoringMode::ClientReported,
                &request(&fx, student, stage_index, 2),
            )
            .await
            .unwrap();
        }

        assert_eq!(
            progress::unlocked_stage(&fx.store, student, fx.exam_id)
                .await
                .unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn test_retake_creates_new_session() {
        let fx = fixture(2, 2, 50.0).await;
        let student = Uuid::new_v4();

        let first = submit_stage(
            &fx.store,
            ScoringMode::ClientReported,
            &request(&fx, student, 0, 0),
        )
        .await
        .unwrap();
        let second = submit_stage(
            &fx.store,
            ScoringMode::ClientReported,
            &request(&fx, student, 0, 2),
        )
        .await
        .unwrap();

        assert_ne!(first.session_id, second.session_id);
        let data = fx.store.snapshot().await;
        assert_eq!(data.sessions.len(), 2);
        assert!(data
            .sessions
            .iter()
            .all(|s| s.status == SessionStatus::Completed));
    }

    #[tokio::test]
    async fn test_unknown_stage_is_bad_request() {
        let fx = fixture(1, 1, 50.0).await;
        let mut req = request(&fx, Uuid::new_v4(), 0, 1);
        req.stage_id = Uuid::new_v4();

        let result = submit_stage(&fx.store, ScoringMode::ClientReported, &req).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_stage_of_other_exam_is_bad_request() {
        let fx = fixture(1, 1, 50.0).await;
        let mut req = request(&fx, Uuid::new_v4(), 0, 1);
        req.exam_id = Uuid::new_v4();

        let result = submit_stage(&fx.store, ScoringMode::ClientReported, &req).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(fx.store.snapshot().await.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_answers_outside_stage_are_ignored() {
        let fx = fixture(2, 2, 50.0).await;
        let student = Uuid::new_v4();
        let mut req = request(&fx, student, 0, 1);
        req.answers.truncate(1);
        req.answers.push(SubmittedAnswer {
            question_id: Uuid::new_v4(),
            selected_answer: "A".to_string(),
            is_correct: true,
        });
        req.answers.push(SubmittedAnswer {
            question_id: fx.questions[1][0].question_id,
            selected_answer: "A".to_string(),
            is_correct: true,
        });

        let outcome = submit_stage(&fx.store, ScoringMode::ClientReported, &req)
            .await
            .unwrap();

        assert_eq!(outcome.correct_count, 1);
        assert_eq!(outcome.total_questions, 2);
        assert_eq!(outcome.score, 50.0);
        assert!(outcome.passed);

        let data = fx.store.snapshot().await;
        assert_eq!(data.answers.len(), 1);
        assert_eq!(data.answers[0].question_id, fx.questions[0][0].question_id);
    }

    #[tokio::test]
    async fn test_stage_without_questions_writes_nothing() {
        let fx = fixture(1, 0, 50.0).await;
        let req = SubmitStageRequest {
            student_id: Uuid::new_v4(),
            exam_id: fx.exam_id,
            stage_id: fx.stages[0].stage_id,
            answers: Vec::new(),
        };

        let result = submit_stage(&fx.store, ScoringMode::ClientReported, &req).await;
        assert!(matches!(result, Err(AppError::InvariantViolation(_))));
        assert!(fx.store.snapshot().await.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_server_verified_mode_ignores_client_flag() {
        let fx = fixture(2, 2, 100.0).await;
        let student = Uuid::new_v4();
        let mut req = request(&fx, student, 0, 0);
        for answer in &mut req.answers {
            answer.is_correct = true;
        }

        let outcome = submit_stage(&fx.store, ScoringMode::ServerVerified, &req)
            .await
            .unwrap();

        assert_eq!(outcome.score, 0.0);
        assert!(!outcome.passed);
        let data = fx.store.snapshot().await;
        assert!(data.answers.iter().all(|a| !a.is_correct));
    }

    /// Store whose transactions fail when progress is advanced.
    struct FailOnAdvance {
        inner: MemoryStore,
    }

    struct FailingTx {
        inner: Box<dyn SubmissionTx>,
    }

    #[async_trait]
    impl SubmissionTx for FailingTx {
        async fn find_in_progress_session(
            &mut self,
            student_id: Uuid,
            exam_id: Uuid,
            stage_order: i32,
        ) -> Result<Option<Uuid>, AppError> {
            self.inner
                .find_in_progress_session(student_id, exam_id, stage_order)
                .await
        }

        async fn insert_session_if_absent(
            &mut self,
            student_id: Uuid,
            exam_id: Uuid,
            stage_order: i32,
        ) -> Result<Option<Uuid>, AppError> {
            self.inner
                .insert_session_if_absent(student_id, exam_id, stage_order)
                .await
        }

        async fn upsert_answers(
            &mut self,
            session_id: Uuid,
            answers: &[GradedAnswer],
        ) -> Result<(), AppError> {
            self.inner.upsert_answers(session_id, answers).await
        }

        async fn complete_session(&mut self, session_id: Uuid) -> Result<bool, AppError> {
            self.inner.complete_session(session_id).await
        }

        async fn max_stage_order(&mut self, exam_id: Uuid) -> Result<Option<i32>, AppError> {
            self.inner.max_stage_order(exam_id).await
        }

        async fn advance_progress(
            &mut self,
            _student_id: Uuid,
            _exam_id: Uuid,
            _candidate: i32,
        ) -> Result<i32, AppError> {
            Err(AppError::ServiceUnavailable("connection reset".to_string()))
        }

        async fn commit(self: Box<Self>) -> Result<(), AppError> {
            self.inner.commit().await
        }
    }

    #[async_trait]
    impl ExamStore for FailOnAdvance {
        async fn list_published_exams(&self) -> Result<Vec<ExamSummary>, AppError> {
            self.inner.list_published_exams().await
        }

        async fn find_exam(&self, exam_id: Uuid) -> Result<Option<Exam>, AppError> {
            self.inner.find_exam(exam_id).await
        }

        async fn list_stages(&self, exam_id: Uuid) -> Result<Vec<Stage>, AppError> {
            self.inner.list_stages(exam_id).await
        }

        async fn find_stage(&self, stage_id: Uuid) -> Result<Option<Stage>, AppError> {
            self.inner.find_stage(stage_id).await
        }

        async fn list_questions(&self, stage_id: Uuid) -> Result<Vec<Question>, AppError> {
            self.inner.list_questions(stage_id).await
        }

        async fn list_options(
            &self,
            question_ids: &[Uuid],
        ) -> Result<Vec<QuestionOption>, AppError> {
            self.inner.list_options(question_ids).await
        }

        async fn list_student_sessions(
            &self,
            student_id: Uuid,
        ) -> Result<Vec<SessionOverview>, AppError> {
            self.inner.list_student_sessions(student_id).await
        }

        async fn list_exam_sessions(
            &self,
            exam_id: Uuid,
            student_id: Uuid,
        ) -> Result<Vec<ExamSession>, AppError> {
            self.inner.list_exam_sessions(exam_id, student_id).await
        }

        async fn latest_completed_session(
            &self,
            student_id: Uuid,
            exam_id: Uuid,
        ) -> Result<Option<ExamSession>, AppError> {
            self.inner.latest_completed_session(student_id, exam_id).await
        }

        async fn list_review_answers(
            &self,
            session_id: Uuid,
            stage_id: Uuid,
        ) -> Result<Vec<ReviewAnswer>, AppError> {
            self.inner.list_review_answers(session_id, stage_id).await
        }

        async fn find_stage_progress(
            &self,
            student_id: Uuid,
            exam_id: Uuid,
        ) -> Result<Option<i32>, AppError> {
            self.inner.find_stage_progress(student_id, exam_id).await
        }

        async fn begin(&self) -> Result<Box<dyn SubmissionTx>, AppError> {
            Ok(Box::new(FailingTx {
                inner: self.inner.begin().await?,
            }))
        }
    }

    #[tokio::test]
    async fn test_failure_mid_submission_rolls_back_everything() {
        let fx = fixture(2, 2, 50.0).await;
        let failing = FailOnAdvance {
            inner: fx.store.clone(),
        };

        let result = submit_stage(
            &failing,
            ScoringMode::ClientReported,
            &request(&fx, Uuid::new_v4(), 0, 2),
        )
        .await;

        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
        let data = fx.store.snapshot().await;
        assert!(data.sessions.is_empty());
        assert!(data.answers.is_empty());
        assert!(data.progress.is_empty());
    }
}
