use tracing::info;

use super::emit::{emit, emit_scan_update};
use crate::domains::jobs::data::JobData;
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::events::JobEvent;
use crate::domains::jobs::models::NewJob;
use crate::kernel::ServerDeps;

/// Create a job, linking the seeded scan in the same transaction.
///
/// Queues a Submit carrying the job with its scans, then a Scan-Update for the
/// seeded scan. Nothing is created or queued when the seeded scan is missing.
pub async fn submit_job(new_job: NewJob, deps: &ServerDeps) -> Result<JobData, JobError> {
    let job = deps.store.create_job(&new_job).await?;
    let scans = deps.linker().list_scans(job.id).await?;

    info!(
        job_id = %job.id,
        job_type = %job.job_type,
        machine = %job.machine,
        scan_id = ?new_job.scan_id,
        "Job submitted"
    );

    let data = JobData::with_scans(job, scans);
    emit(JobEvent::submitted(data.clone()), deps);

    if let Some(scan_id) = new_job.scan_id {
        emit_scan_update(scan_id, deps).await;
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::jobs::models::JobType;
    use crate::kernel::TestDependencies;

    #[tokio::test]
    async fn seeded_scan_is_returned_with_the_job() {
        let test = TestDependencies::new();
        let scan = test.store.insert_scan(Some(42), vec![]);

        let new_job = NewJob::builder()
            .job_type(JobType::Count)
            .machine("m1")
            .scan_id(scan.id)
            .build();
        let data = submit_job(new_job, test.deps()).await.unwrap();

        assert_eq!(data.scans, Some(vec![scan]));
    }

    #[tokio::test]
    async fn missing_seed_scan_creates_nothing() {
        let test = TestDependencies::new();
        let new_job = NewJob::builder()
            .job_type(JobType::Count)
            .machine("m1")
            .scan_id(crate::common::ScanId::from_i64(9))
            .build();

        let err = submit_job(new_job, test.deps()).await.unwrap_err();
        assert!(matches!(err, JobError::LinkTargetMissing(_)));
        assert_eq!(test.flush().await, 0);
    }
}
