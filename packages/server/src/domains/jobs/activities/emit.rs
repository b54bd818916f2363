//! Post-commit event emission.
//!
//! The store change is already committed when these run, so failures are
//! logged rather than returned to the caller.

use tracing::{debug, error};

use crate::common::{JobId, ScanId};
use crate::domains::jobs::events::JobEvent;
use crate::kernel::ServerDeps;

pub fn emit(event: JobEvent, deps: &ServerDeps) {
    let kind = event.kind();
    let key = event.partition_key();
    if let Err(e) = deps.events.publish(event) {
        error!(event_type = kind.as_str(), key = %key, error = %e, "Failed to queue event");
    }
}

/// Queue a Scan-Update carrying every job currently linked to `scan_id`.
pub async fn emit_scan_update(scan_id: ScanId, deps: &ServerDeps) {
    match deps.store.jobs_for_scan(scan_id).await {
        Ok(jobs) => {
            debug!(scan_id = %scan_id, jobs = jobs.len(), "Fanning out scan update");
            emit(JobEvent::scan_updated(scan_id, jobs), deps);
        }
        Err(e) => {
            error!(scan_id = %scan_id, error = %e, "Failed to read jobs for scan update");
        }
    }
}

/// Queue a Scan-Update for every scan linked to `job_id`, in link order.
pub async fn emit_scan_updates_for_job(job_id: JobId, deps: &ServerDeps) {
    let scans = match deps.store.scans_for_job(job_id).await {
        Ok(scans) => scans,
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to read scans for scan update");
            return;
        }
    };

    for scan in scans {
        emit_scan_update(scan.id, deps).await;
    }
}
