// src/handlers/review.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::{
        answer::{ReviewAnswer, ReviewAnswerDetail, ReviewParams, ReviewResponse},
        question::options_for,
        session::ExamSession,
    },
    store::ExamStore,
    utils::deadline::with_deadline,
};

/// Latest completed session of the student for the exam, with its answers to the given stage.
async fn load_review(
    store: &dyn ExamStore,
    params: &ReviewParams,
) -> Result<(ExamSession, Vec<ReviewAnswer>), AppError> {
    let session = store
        .latest_completed_session(params.student_id, params.exam_id)
        .await?
        .ok_or(AppError::NotFound("No completed session found".to_string()))?;

    let answers = store
        .list_review_answers(session.session_id, params.stage_id)
        .await?;

    Ok((session, answers))
}

/// Reviews the answers given in the latest completed session.
pub async fn get_review(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
    params: Result<Query<ReviewParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let (session, answers) =
        with_deadline(config.store_timeout, load_review(store.as_ref(), &params)).await?;

    Ok(Json(ReviewResponse { session, answers }))
}

/// Same as `get_review`, with the options of every question attached.
pub async fn get_review_details(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
    params: Result<Query<ReviewParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let response = with_deadline(config.store_timeout, async {
        let (session, answers) = load_review(store.as_ref(), &params).await?;

        let question_ids: Vec<Uuid> = answers.iter().map(|a| a.answer.question_id).collect();
        let options = store.list_options(&question_ids).await?;

        let answers = answers
            .into_iter()
            .map(|answer| {
                let options = options_for(answer.answer.question_id, &options);
                ReviewAnswerDetail { answer, options }
            })
            .collect();

        Ok::<_, AppError>(ReviewResponse { session, answers })
    })
    .await?;

    Ok(Json(response))
}
