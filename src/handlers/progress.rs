// src/handlers/progress.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::progress::StageProgress,
    services::progress::unlocked_stage,
    store::ExamStore,
    utils::deadline::with_deadline,
};

/// Returns the highest stage the student may enter. Only stage 1 is open without progress.
pub async fn get_stage_progress(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path((exam_id, student_id)) = path?;
    let current_stage_order = with_deadline(
        config.store_timeout,
        unlocked_stage(store.as_ref(), student_id, exam_id),
    )
    .await?;

    Ok(Json(StageProgress {
        current_stage_order,
    }))
}

/// Lists every session of a student with the exam title, newest first.
pub async fn list_student_progress(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(student_id) = path?;
    let sessions =
        with_deadline(config.store_timeout, store.list_student_sessions(student_id)).await?;
    Ok(Json(sessions))
}

/// Lists the sessions of a student for one exam.
pub async fn list_exam_sessions(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path((exam_id, student_id)) = path?;
    let sessions = with_deadline(
        config.store_timeout,
        store.list_exam_sessions(exam_id, student_id),
    )
    .await?;
    Ok(Json(sessions))
}
