//! Read-side activities.

use crate::common::JobId;
use crate::domains::jobs::data::JobData;
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::models::{Job, Scan};
use crate::domains::jobs::navigator::{self, Neighbors};
use crate::domains::jobs::store::JobFilter;
use crate::kernel::ServerDeps;

/// A single job with its same-type neighbors.
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub data: JobData,
    pub neighbors: Neighbors,
}

/// One page of a listing plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPage {
    pub jobs: Vec<JobData>,
    pub total: i64,
}

pub async fn get_job(
    job_id: JobId,
    with_scans: bool,
    deps: &ServerDeps,
) -> Result<JobView, JobError> {
    let job = deps
        .store
        .find_job(job_id)
        .await?
        .ok_or_else(|| JobError::job_not_found(job_id))?;
    let neighbors = navigator::neighbors(deps.store.as_ref(), job_id).await?;

    Ok(JobView {
        data: resolve_scans(job, with_scans, deps).await?,
        neighbors,
    })
}

/// First job reported under a scheduler id.
pub async fn get_job_by_slurm_id(slurm_id: i64, deps: &ServerDeps) -> Result<Job, JobError> {
    deps.store
        .find_job_by_slurm_id(slurm_id)
        .await?
        .ok_or(JobError::NotFound {
            entity: "Slurm job",
            id: slurm_id,
        })
}

pub async fn list_jobs(
    filter: &JobFilter,
    with_scans: bool,
    deps: &ServerDeps,
) -> Result<JobPage, JobError> {
    filter.validate()?;

    let total = deps.store.count_jobs(filter).await?;
    let mut jobs = Vec::new();
    for job in deps.store.list_jobs(filter).await? {
        jobs.push(resolve_scans(job, with_scans, deps).await?);
    }

    Ok(JobPage { jobs, total })
}

/// Scans linked to a job, in link order.
pub async fn job_scans(job_id: JobId, deps: &ServerDeps) -> Result<Vec<Scan>, JobError> {
    if deps.store.find_job(job_id).await?.is_none() {
        return Err(JobError::job_not_found(job_id));
    }
    deps.linker().list_scans(job_id).await
}

async fn resolve_scans(job: Job, with_scans: bool, deps: &ServerDeps) -> Result<JobData, JobError> {
    if !with_scans {
        return Ok(JobData::without_scans(job));
    }
    let scans = deps.linker().list_scans(job.id).await?;
    Ok(JobData::with_scans(job, scans))
}
