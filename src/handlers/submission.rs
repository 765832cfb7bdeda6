// src/handlers/submission.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::answer::SubmitStageRequest,
    services::submission::submit_stage as run_submission,
    store::ExamStore,
    utils::deadline::with_deadline,
};

/// Submits the answers of one stage.
///
/// * Validates the payload.
/// * Records the attempt, scores it and unlocks the next stage on a pass.
/// * Returns the score alongside `success: true`.
pub async fn submit_stage(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
    payload: Result<Json<SubmitStageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;

    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let outcome = with_deadline(
        config.store_timeout,
        run_submission(store.as_ref(), config.scoring_mode, &req),
    )
    .await
    .map_err(|e| {
        // 5xx are logged when the error is rendered.
        if e.is_client_error() {
            tracing::warn!("Rejected submission for stage {}: {}", req.stage_id, e);
        }
        e
    })?;

    Ok(Json(outcome))
}
