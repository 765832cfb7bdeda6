// src/handlers/exams.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    config::{Config, ScoringMode},
    error::AppError,
    models::{
        exam::ExamDetail,
        question::{PublicQuestion, StageDetail, options_for},
    },
    store::ExamStore,
    utils::deadline::with_deadline,
};

/// Lists published exams with instructor name, number of stages and total exam time.
pub async fn list_exams(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
) -> Result<impl IntoResponse, AppError> {
    let exams = with_deadline(config.store_timeout, store.list_published_exams()).await?;
    Ok(Json(exams))
}

/// Retrieves an exam with its stages in progression order.
pub async fn get_exam_details(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(exam_id) = path?;
    let detail = with_deadline(config.store_timeout, async {
        let exam = store
            .find_exam(exam_id)
            .await?
            .ok_or(AppError::NotFound("Not found".to_string()))?;
        let stages = store.list_stages(exam_id).await?;
        Ok::<_, AppError>(ExamDetail { exam, stages })
    })
    .await?;

    Ok(Json(detail))
}

/// Retrieves a stage with its questions, each with its options attached.
///
/// The answer key is only sent when scoring relies on the client's own judgement.
pub async fn get_stage(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(stage_id) = path?;
    let reveal_answer = config.scoring_mode == ScoringMode::ClientReported;

    let detail = with_deadline(config.store_timeout, async {
        let stage = store
            .find_stage(stage_id)
            .await?
            .ok_or(AppError::NotFound("Not found".to_string()))?;

        let questions = store.list_questions(stage_id).await?;
        let question_ids: Vec<Uuid> = questions.iter().map(|q| q.question_id).collect();
        let options = store.list_options(&question_ids).await?;

        let questions = questions
            .into_iter()
            .map(|q| {
                let question_options = options_for(q.question_id, &options);
                PublicQuestion::new(q, question_options, reveal_answer)
            })
            .collect();

        Ok::<_, AppError>(StageDetail { stage, questions })
    })
    .await?;

    Ok(Json(detail))
}
