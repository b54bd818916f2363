use serde::Serialize;

use crate::common::JobId;
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::store::JobStore;

/// Adjacent jobs of the same type, for sequential paging that skips
/// interleaved jobs of other types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Neighbors {
    pub previous: Option<JobId>,
    pub next: Option<JobId>,
}

/// Previous (greatest lower id) and next (smallest higher id) job of the same
/// type as `job_id`.
pub async fn neighbors(store: &dyn JobStore, job_id: JobId) -> Result<Neighbors, JobError> {
    let job = store
        .find_job(job_id)
        .await?
        .ok_or_else(|| JobError::job_not_found(job_id))?;

    let (previous, next) = store.neighbor_ids(&job).await?;

    Ok(Neighbors { previous, next })
}
