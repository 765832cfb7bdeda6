// src/services/progress.rs

use uuid::Uuid;

use crate::{
    error::AppError,
    store::{ExamStore, SubmissionTx},
};

/// Stage that is open before anything has been passed.
pub const FIRST_STAGE: i32 = 1;

/// Stage to unlock after passing `stage_order`, capped at one past the last stage.
pub fn next_stage_candidate(stage_order: i32, max_stage_order: i32) -> i32 {
    (stage_order + 1).min(max_stage_order + 1)
}

/// Raises the unlocked stage to `candidate` unless it is already higher.
/// The caller is responsible for the ceiling.
pub async fn advance(
    tx: &mut dyn SubmissionTx,
    student_id: Uuid,
    exam_id: Uuid,
    candidate: i32,
) -> Result<i32, AppError> {
    let current = tx.advance_progress(student_id, exam_id, candidate).await?;
    tracing::debug!(
        "Stage progress for student {} exam {} is now {} (candidate {})",
        student_id,
        exam_id,
        current,
        candidate
    );
    Ok(current)
}

/// Highest stage the student may enter, `FIRST_STAGE` when no row exists.
pub async fn unlocked_stage(
    store: &dyn ExamStore,
    student_id: Uuid,
    exam_id: Uuid,
) -> Result<i32, AppError> {
    Ok(store
        .find_stage_progress(student_id, exam_id)
        .await?
        .unwrap_or(FIRST_STAGE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_candidate_is_next_stage() {
        assert_eq!(next_stage_candidate(1, 3), 2);
        assert_eq!(next_stage_candidate(2, 3), 3);
    }

    #[test]
    fn test_candidate_never_exceeds_ceiling() {
        assert_eq!(next_stage_candidate(3, 3), 4);
        // Stage order above the recorded maximum still caps at max + 1.
        assert_eq!(next_stage_candidate(7, 3), 4);
    }

    #[tokio::test]
    async fn test_default_unlock_is_first_stage() {
        let store = MemoryStore::new();
        let stage = unlocked_stage(&store, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(stage, 1);
    }

    #[tokio::test]
    async fn test_progress_is_max_of_candidates() {
        let store = MemoryStore::new();
        let (student, exam) = (Uuid::new_v4(), Uuid::new_v4());

        for candidate in [2, 4, 3, 1, 4, 2] {
            let mut tx = store.begin().await.unwrap();
            advance(tx.as_mut(), student, exam, candidate).await.unwrap();
            tx.commit().await.unwrap();
        }

        assert_eq!(unlocked_stage(&store, student, exam).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_progress_is_per_exam() {
        let store = MemoryStore::new();
        let student = Uuid::new_v4();
        let (exam_a, exam_b) = (Uuid::new_v4(), Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        advance(tx.as_mut(), student, exam_a, 3).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(unlocked_stage(&store, student, exam_a).await.unwrap(), 3);
        assert_eq!(unlocked_stage(&store, student, exam_b).await.unwrap(), 1);
    }
}
