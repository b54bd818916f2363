use thiserror::Error;

use crate::common::ScanId;

/// Failures surfaced by job operations.
///
/// Nothing here is retried locally; callers decide.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Scan does not exist: {0}")]
    LinkTargetMissing(ScanId),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event bus error: {0}")]
    Bus(String),
}

impl JobError {
    pub fn job_not_found(id: impl Into<i64>) -> Self {
        JobError::NotFound {
            entity: "Job",
            id: id.into(),
        }
    }

    /// True for both missing jobs and missing link targets.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            JobError::NotFound { .. } | JobError::LinkTargetMissing(_)
        )
    }
}
