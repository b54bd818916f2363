//! Persistence seam for jobs, scans and their associations.
//!
//! - [`PostgresJobStore`] - sqlx-backed store used by the server
//! - [`InMemoryJobStore`] - single-process store for tests and local tooling
//!
//! Both execute an [`UpdatePlan`] atomically: the scan link target is
//! resolved, the guarded scalar statement runs and the association is
//! inserted if absent, all or nothing.

mod memory;
mod postgres;

pub use memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;

use async_trait::async_trait;
use serde::Deserialize;

use crate::common::{JobId, ScanId};
use crate::domains::jobs::conditional::{UpdateOutcome, UpdatePlan};
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::models::{Job, JobType, NewJob, Scan};

/// Default page size for job listings.
pub const DEFAULT_LIMIT: i64 = 100;

/// Filters and paging for job listings. Listings are newest first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub slurm_id: Option<i64>,
    #[serde(default)]
    pub job_type: Option<JobType>,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
            slurm_id: None,
            job_type: None,
        }
    }
}

impl JobFilter {
    pub fn validate(&self) -> Result<(), JobError> {
        if self.skip < 0 {
            return Err(JobError::Invalid("skip must not be negative".to_string()));
        }
        if self.limit < 0 {
            return Err(JobError::Invalid("limit must not be negative".to_string()));
        }
        Ok(())
    }

    /// Whether `job` passes the (non-paging) filters.
    pub fn matches(&self, job: &Job) -> bool {
        self.slurm_id.map_or(true, |slurm_id| job.slurm_id == Some(slurm_id))
            && self.job_type.map_or(true, |job_type| job.job_type == job_type)
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find_job(&self, id: JobId) -> Result<Option<Job>, JobError>;

    /// First job reported under a scheduler id.
    async fn find_job_by_slurm_id(&self, slurm_id: i64) -> Result<Option<Job>, JobError>;

    /// One page of jobs matching `filter`, newest first.
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError>;

    /// Size of the filtered set, ignoring paging.
    async fn count_jobs(&self, filter: &JobFilter) -> Result<i64, JobError>;

    /// Insert a job in its initial state, linking `new_job.scan_id` in the
    /// same transaction. Fails with `LinkTargetMissing` and inserts nothing
    /// when that scan does not exist.
    async fn create_job(&self, new_job: &NewJob) -> Result<Job, JobError>;

    /// Execute a conditional update. Fails with `NotFound` for an unknown job
    /// and with `LinkTargetMissing` (writing nothing) for an unknown scan.
    async fn apply_update(&self, plan: &UpdatePlan) -> Result<UpdateOutcome, JobError>;

    /// Scans linked to a job, in the order they were linked.
    async fn scans_for_job(&self, id: JobId) -> Result<Vec<Scan>, JobError>;

    /// Jobs currently linked to a scan, by ascending id.
    async fn jobs_for_scan(&self, id: ScanId) -> Result<Vec<Job>, JobError>;

    /// Closest lower and higher job ids with the same job type.
    async fn neighbor_ids(
        &self,
        job: &Job,
    ) -> Result<(Option<JobId>, Option<JobId>), JobError>;

    /// Cheap round trip for health checks.
    async fn ping(&self) -> Result<(), JobError>;
}
