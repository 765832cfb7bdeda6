// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{exams, progress, review, submission},
    state::AppState,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed)
    }
}

/// Assembles the main application router.
///
/// * Mounts the exam routes under `/api/exams`.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store handle and configuration).
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let exam_routes = Router::new()
        .route("/exams", get(exams::list_exams))
        .route("/details/{exam_id}", get(exams::get_exam_details))
        .route("/stages/{stage_id}", get(exams::get_stage))
        .route("/progress/{student_id}", get(progress::list_student_progress))
        .route("/submit-stage", post(submission::submit_stage))
        .route("/review", get(review::get_review))
        .route("/reviewdetails", get(review::get_review_details))
        .route(
            "/{exam_id}/progress/{student_id}",
            get(progress::list_exam_sessions),
        )
        .route(
            "/{exam_id}/stage-progress/{student_id}",
            get(progress::get_stage_progress),
        );

    Router::new()
        .route("/", get(|| async { "API is running" }))
        .nest("/api/exams", exam_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
