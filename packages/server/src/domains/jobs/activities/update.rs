use tracing::{debug, info};

use super::emit::{emit, emit_scan_update, emit_scan_updates_for_job};
use crate::common::{JobId, ScanId};
use crate::domains::jobs::conditional::UpdatePlan;
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::events::JobEvent;
use crate::domains::jobs::models::{Job, JobPatch};
use crate::kernel::ServerDeps;

/// Apply a sparse patch and return the reloaded job.
///
/// When anything changed (a scalar field or a new scan link) an Update is
/// queued, followed by a Scan-Update for every scan the job is linked to.
/// A patch that matches the stored values queues nothing.
pub async fn update_job(
    job_id: JobId,
    patch: JobPatch,
    deps: &ServerDeps,
) -> Result<Job, JobError> {
    let plan = UpdatePlan::from_patch(job_id, &patch);
    let outcome = deps.store.apply_update(&plan).await?;

    if !outcome.changed() {
        debug!(job_id = %job_id, "Patch matched stored values");
        return Ok(outcome.job);
    }

    info!(
        job_id = %job_id,
        state = ?outcome.job.state,
        fields_changed = outcome.fields_changed,
        linked = outcome.linked,
        "Job updated"
    );

    emit(JobEvent::updated(&outcome.job), deps);
    emit_scan_updates_for_job(job_id, deps).await;

    Ok(outcome.job)
}

/// Attach a scan to a job. Returns whether a new link was added.
///
/// A new link is a change to the job, so it queues the same events an
/// update would, with the Scan-Update limited to the newly linked scan.
pub async fn link_scan(
    job_id: JobId,
    scan_id: ScanId,
    deps: &ServerDeps,
) -> Result<bool, JobError> {
    let linker = deps.linker();
    if !linker.link(job_id, scan_id).await? {
        return Ok(false);
    }

    info!(job_id = %job_id, scan_id = %scan_id, "Scan linked");

    let job = deps
        .store
        .find_job(job_id)
        .await?
        .ok_or_else(|| JobError::job_not_found(job_id))?;
    emit(JobEvent::updated(&job), deps);
    emit_scan_update(scan_id, deps).await;

    Ok(true)
}
