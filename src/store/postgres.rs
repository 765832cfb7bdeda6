// src/store/postgres.rs

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction, postgres::PgPoolOptions};
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::{
        answer::{GradedAnswer, ReviewAnswer},
        exam::{Exam, ExamSummary, Stage},
        question::{Question, QuestionOption},
        session::{ExamSession, SessionOverview},
    },
    store::{ExamStore, SubmissionTx},
};

const EXAM_COLUMNS: &str = "e.exam_id, e.name, e.description, e.is_published, e.created_by, e.created_at";
const STAGE_COLUMNS: &str = "stage_id, exam_id, stage_order, passing_score, time_limit";
const QUESTION_COLUMNS: &str =
    "question_id, stage_id, question_text, correct_answer, explanation, created_at";
const SESSION_COLUMNS: &str =
    "es.session_id, es.student_id, es.exam_id, es.current_stage, es.status, es.start_time, es.end_time";

const CONNECT_ATTEMPTS: u32 = 5;

/// PostgreSQL-backed Persistence Gateway.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Opens the shared pool, retrying while the database comes up.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| AppError::InternalServerError("DATABASE_URL must be set".to_string()))?;

        let mut retry_count = 0;
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    retry_count += 1;
                    if retry_count >= CONNECT_ATTEMPTS {
                        tracing::error!("Failed to connect to database after {} attempts", retry_count);
                        return Err(AppError::from(e));
                    }
                    tracing::warn!(
                        "Database not ready, retrying in 2s... (Attempt {}): {}",
                        retry_count,
                        e
                    );
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        };

        tracing::info!("Database connected...");
        Ok(Self::new(pool))
    }

    /// Applies the schema in `./migrations`.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::InternalServerError(format!("migration failed: {}", e)))
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn list_published_exams(&self) -> Result<Vec<ExamSummary>, AppError> {
        let exams = sqlx::query_as::<_, ExamSummary>(&format!(
            r#"
            SELECT {EXAM_COLUMNS},
                   i.name AS instructor_name,
                   (SELECT COUNT(*) FROM stages s WHERE s.exam_id = e.exam_id) AS stage_count,
                   (SELECT COALESCE(SUM(s.time_limit), 0) FROM stages s WHERE s.exam_id = e.exam_id)::BIGINT AS total_time_minutes
            FROM exams e
            JOIN instructors i ON e.created_by = i.instructor_id
            WHERE e.is_published = TRUE
            ORDER BY e.created_at DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(exams)
    }

    async fn find_exam(&self, exam_id: Uuid) -> Result<Option<Exam>, AppError> {
        let exam = sqlx::query_as::<_, Exam>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams e WHERE e.exam_id = $1"
        ))
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(exam)
    }

    async fn list_stages(&self, exam_id: Uuid) -> Result<Vec<Stage>, AppError> {
        let stages = sqlx::query_as::<_, Stage>(&format!(
            "SELECT {STAGE_COLUMNS} FROM stages WHERE exam_id = $1 ORDER BY stage_order ASC"
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(stages)
    }

    async fn find_stage(&self, stage_id: Uuid) -> Result<Option<Stage>, AppError> {
        let stage = sqlx::query_as::<_, Stage>(&format!(
            "SELECT {STAGE_COLUMNS} FROM stages WHERE stage_id = $1"
        ))
        .bind(stage_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stage)
    }

    async fn list_questions(&self, stage_id: Uuid) -> Result<Vec<Question>, AppError> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE stage_id = $1 ORDER BY created_at ASC"
        ))
        .bind(stage_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn list_options(&self, question_ids: &[Uuid]) -> Result<Vec<QuestionOption>, AppError> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }

        let options = sqlx::query_as::<_, QuestionOption>(
            r#"
            SELECT option_id, question_id, option_text
            FROM question_options
            WHERE question_id = ANY($1)
            ORDER BY option_text ASC
            "#,
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(options)
    }

    async fn list_student_sessions(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<SessionOverview>, AppError> {
        let sessions = sqlx::query_as::<_, SessionOverview>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}, e.name AS exam_title, e.is_published
            FROM exam_sessions es
            JOIN exams e ON es.exam_id = e.exam_id
            WHERE es.student_id = $1
            ORDER BY es.start_time DESC
            "#
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Error fetching sessions: {:?}", e);
            AppError::from(e)
        })?;

        Ok(sessions)
    }

    async fn list_exam_sessions(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<ExamSession>, AppError> {
        let sessions = sqlx::query_as::<_, ExamSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM exam_sessions es
            WHERE es.exam_id = $1 AND es.student_id = $2
            ORDER BY es.start_time ASC
            "#
        ))
        .bind(exam_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    async fn latest_completed_session(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<ExamSession>, AppError> {
        let session = sqlx::query_as::<_, ExamSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM exam_sessions es
            WHERE es.student_id = $1 AND es.exam_id = $2 AND es.status = 'completed'
            ORDER BY es.end_time DESC
            LIMIT 1
            "#
        ))
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn list_review_answers(
        &self,
        session_id: Uuid,
        stage_id: Uuid,
    ) -> Result<Vec<ReviewAnswer>, AppError> {
        let answers = sqlx::query_as::<_, ReviewAnswer>(
            r#"
            SELECT sa.session_id, sa.question_id, sa.selected_answer, sa.is_correct, sa.answered_at,
                   q.stage_id, q.question_text, q.correct_answer, q.explanation
            FROM student_answers sa
            JOIN questions q ON sa.question_id = q.question_id
            WHERE sa.session_id = $1 AND q.stage_id = $2
            ORDER BY q.created_at ASC
            "#,
        )
        .bind(session_id)
        .bind(stage_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(answers)
    }

    async fn find_stage_progress(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<i32>, AppError> {
        let current = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT current_stage_order
            FROM student_stage_progress
            WHERE exam_id = $1 AND student_id = $2
            "#,
        )
        .bind(exam_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(current)
    }

    async fn begin(&self) -> Result<Box<dyn SubmissionTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSubmissionTx { tx }))
    }
}

/// Submission write path inside one PostgreSQL transaction.
/// Rolled back by sqlx when dropped uncommitted.
pub struct PgSubmissionTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SubmissionTx for PgSubmissionTx {
    async fn find_in_progress_session(
        &mut self,
        student_id: Uuid,
        exam_id: Uuid,
        stage_order: i32,
    ) -> Result<Option<Uuid>, AppError> {
        let session_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT session_id
            FROM exam_sessions
            WHERE student_id = $1 AND exam_id = $2 AND current_stage = $3 AND status = 'in_progress'
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .bind(stage_order)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(session_id)
    }

    async fn insert_session_if_absent(
        &mut self,
        student_id: Uuid,
        exam_id: Uuid,
        stage_order: i32,
    ) -> Result<Option<Uuid>, AppError> {
        // Relies on the partial unique index `exam_sessions_one_in_progress`.
        let session_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO exam_sessions (student_id, exam_id, current_stage, status)
            VALUES ($1, $2, $3, 'in_progress')
            ON CONFLICT (student_id, exam_id, current_stage) WHERE status = 'in_progress'
            DO NOTHING
            RETURNING session_id
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .bind(stage_order)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(session_id)
    }

    async fn upsert_answers(
        &mut self,
        session_id: Uuid,
        answers: &[GradedAnswer],
    ) -> Result<(), AppError> {
        if answers.is_empty() {
            return Ok(());
        }

        let mut query_builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO student_answers (session_id, question_id, selected_answer, is_correct) ",
        );
        query_builder.push_values(answers, |mut row, answer| {
            row.push_bind(session_id)
                .push_bind(answer.question_id)
                .push_bind(answer.selected_answer.clone())
                .push_bind(answer.is_correct);
        });
        query_builder.push(
            r#"
            ON CONFLICT (session_id, question_id) DO UPDATE SET
                selected_answer = EXCLUDED.selected_answer,
                is_correct = EXCLUDED.is_correct,
                answered_at = CURRENT_TIMESTAMP
            "#,
        );

        query_builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to upsert answers: {:?}", e);
                AppError::from(e)
            })?;

        Ok(())
    }

    async fn complete_session(&mut self, session_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE exam_sessions
            SET status = 'completed', end_time = NOW()
            WHERE session_id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(session_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn max_stage_order(&mut self, exam_id: Uuid) -> Result<Option<i32>, AppError> {
        let max = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(stage_order) FROM stages WHERE exam_id = $1",
        )
        .bind(exam_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(max)
    }

    async fn advance_progress(
        &mut self,
        student_id: Uuid,
        exam_id: Uuid,
        candidate: i32,
    ) -> Result<i32, AppError> {
        let current = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO student_stage_progress (student_id, exam_id, current_stage_order)
            VALUES ($1, $2, $3)
            ON CONFLICT (student_id, exam_id) DO UPDATE SET
                current_stage_order = GREATEST(student_stage_progress.current_stage_order, EXCLUDED.current_stage_order),
                updated_at = CURRENT_TIMESTAMP
            RETURNING current_stage_order
            "#,
        )
        .bind(student_id)
        .bind(exam_id)
        .bind(candidate)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to advance stage progress: {:?}", e);
            AppError::from(e)
        })?;

        Ok(current)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
