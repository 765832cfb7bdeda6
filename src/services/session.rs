// src/services/session.rs

use uuid::Uuid;

use crate::{error::AppError, store::SubmissionTx};

/// Lookup/insert rounds before giving up on a contended triple.
const RESOLVE_ATTEMPTS: usize = 3;

/// Returns the in_progress session for (student, exam, stage_order), creating
/// one when none exists.
///
/// The insert is guarded by the storage-level uniqueness constraint. When a
/// concurrent submission wins the insert, the session is looked up again.
pub async fn resolve_session(
    tx: &mut dyn SubmissionTx,
    student_id: Uuid,
    exam_id: Uuid,
    stage_order: i32,
) -> Result<Uuid, AppError> {
    for attempt in 1..=RESOLVE_ATTEMPTS {
        if let Some(session_id) = tx
            .find_in_progress_session(student_id, exam_id, stage_order)
            .await?
        {
            return Ok(session_id);
        }

        if let Some(session_id) = tx
            .insert_session_if_absent(student_id, exam_id, stage_order)
            .await?
        {
            tracing::debug!(
                "Created session {} for student {} exam {} stage {}",
                session_id,
                student_id,
                exam_id,
                stage_order
            );
            return Ok(session_id);
        }

        tracing::warn!(
            "Session insert lost a race for student {} exam {} stage {} (attempt {})",
            student_id,
            exam_id,
            stage_order,
            attempt
        );
    }

    Err(AppError::ServiceUnavailable(
        "could not resolve exam session under contention".to_string(),
    ))
}

/// Marks the session completed. Completing twice is an error.
pub async fn complete_session(tx: &mut dyn SubmissionTx, session_id: Uuid) -> Result<(), AppError> {
    if tx.complete_session(session_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound(format!(
            "No in-progress session {}",
            session_id
        )))
    }
}
