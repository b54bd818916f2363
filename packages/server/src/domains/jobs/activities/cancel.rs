use tracing::info;

use super::emit::emit;
use crate::common::JobId;
use crate::domains::jobs::data::JobData;
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::events::JobEvent;
use crate::kernel::ServerDeps;

/// Request cancellation of a job.
///
/// The stored state is left alone; the scheduler side reacts to the Cancel
/// event and reports the resulting state through a regular update. The event
/// is queued whatever state the job is in.
pub async fn cancel_job(job_id: JobId, deps: &ServerDeps) -> Result<JobData, JobError> {
    let job = deps
        .store
        .find_job(job_id)
        .await?
        .ok_or_else(|| JobError::job_not_found(job_id))?;
    let scans = deps.linker().list_scans(job_id).await?;

    info!(job_id = %job_id, state = ?job.state, "Cancellation requested");

    let data = JobData::with_scans(job, scans);
    emit(JobEvent::cancelled(data.clone()), deps);

    Ok(data)
}
