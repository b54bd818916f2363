//! Job endpoints, mounted under `/api/v1`.
//!
//! - `POST   /jobs`                 submit a job
//! - `GET    /jobs`                 list, newest first (`X-Total-Count`)
//! - `GET    /jobs/:id`             one job (`X-Previous-Job`, `X-Next-Job`)
//! - `GET    /jobs/:id/scans`       linked scans
//! - `PUT    /jobs/:id/scans/:scan_id` link a scan
//! - `PATCH  /jobs/:id`             sparse update
//! - `PUT    /jobs/:id/cancel`      request cancellation
//! - `GET    /jobs/slurm/:slurm_id` lookup by scheduler id

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, HeaderValue},
    Json,
};
use serde::Deserialize;

use crate::common::{JobId, ScanId};
use crate::domains::jobs::activities;
use crate::domains::jobs::data::JobData;
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::models::{JobPatch, JobType, NewJob, Scan};
use crate::domains::jobs::store::{JobFilter, DEFAULT_LIMIT};
use crate::server::app::AxumAppState;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";
pub const PREVIOUS_JOB_HEADER: &str = "x-previous-job";
pub const NEXT_JOB_HEADER: &str = "x-next-job";

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
    slurm_id: Option<i64>,
    job_type: Option<JobType>,
    #[serde(default)]
    with_scans: bool,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl ListJobsQuery {
    fn filter(&self) -> JobFilter {
        JobFilter {
            skip: self.skip,
            limit: self.limit,
            slurm_id: self.slurm_id,
            job_type: self.job_type,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WithScansQuery {
    #[serde(default)]
    with_scans: bool,
}

pub async fn create_job_handler(
    Extension(state): Extension<AxumAppState>,
    Json(new_job): Json<NewJob>,
) -> Result<Json<JobData>, JobError> {
    let data = activities::submit_job(new_job, &state.deps).await?;
    Ok(Json(data))
}

pub async fn list_jobs_handler(
    Extension(state): Extension<AxumAppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<(HeaderMap, Json<Vec<JobData>>), JobError> {
    let page = activities::list_jobs(&query.filter(), query.with_scans, &state.deps).await?;

    let mut headers = HeaderMap::new();
    headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from(page.total));

    Ok((headers, Json(page.jobs)))
}

pub async fn get_job_handler(
    Extension(state): Extension<AxumAppState>,
    Path(id): Path<JobId>,
    Query(query): Query<WithScansQuery>,
) -> Result<(HeaderMap, Json<JobData>), JobError> {
    let view = activities::get_job(id, query.with_scans, &state.deps).await?;

    let mut headers = HeaderMap::new();
    if let Some(previous) = view.neighbors.previous {
        headers.insert(PREVIOUS_JOB_HEADER, HeaderValue::from(previous.into_i64()));
    }
    if let Some(next) = view.neighbors.next {
        headers.insert(NEXT_JOB_HEADER, HeaderValue::from(next.into_i64()));
    }

    Ok((headers, Json(view.data)))
}

pub async fn job_scans_handler(
    Extension(state): Extension<AxumAppState>,
    Path(id): Path<JobId>,
) -> Result<Json<Vec<Scan>>, JobError> {
    let scans = activities::job_scans(id, &state.deps).await?;
    Ok(Json(scans))
}

pub async fn link_scan_handler(
    Extension(state): Extension<AxumAppState>,
    Path((id, scan_id)): Path<(JobId, ScanId)>,
) -> Result<Json<Vec<Scan>>, JobError> {
    activities::link_scan(id, scan_id, &state.deps).await?;
    let scans = activities::job_scans(id, &state.deps).await?;
    Ok(Json(scans))
}

pub async fn update_job_handler(
    Extension(state): Extension<AxumAppState>,
    Path(id): Path<JobId>,
    Json(patch): Json<JobPatch>,
) -> Result<Json<JobData>, JobError> {
    let job = activities::update_job(id, patch, &state.deps).await?;
    Ok(Json(JobData::without_scans(job)))
}

pub async fn cancel_job_handler(
    Extension(state): Extension<AxumAppState>,
    Path(id): Path<JobId>,
) -> Result<Json<JobData>, JobError> {
    let data = activities::cancel_job(id, &state.deps).await?;
    Ok(Json(data))
}

pub async fn job_by_slurm_id_handler(
    Extension(state): Extension<AxumAppState>,
    Path(slurm_id): Path<i64>,
) -> Result<Json<JobData>, JobError> {
    let job = activities::get_job_by_slurm_id(slurm_id, &state.deps).await?;
    Ok(Json(JobData::without_scans(job)))
}
