//! Test fixtures for creating test data.

use anyhow::Result;
use jobs_core::common::ScanId;
use jobs_core::domains::jobs::models::{JobType, Location, NewJob, Scan};
use sqlx::types::Json;
use sqlx::PgPool;

pub fn new_job(job_type: JobType) -> NewJob {
    NewJob::builder().job_type(job_type).machine("perlmutter").build()
}

pub fn new_job_for_scan(job_type: JobType, scan_id: ScanId) -> NewJob {
    NewJob::builder()
        .job_type(job_type)
        .machine("perlmutter")
        .scan_id(scan_id)
        .build()
}

pub fn location(host: &str, path: &str) -> Location {
    Location {
        host: host.to_string(),
        path: path.to_string(),
    }
}

/// Insert a scan row. Scans are owned upstream, so the store never creates them.
pub async fn create_test_scan(pool: &PgPool, scan_number: i64) -> Result<Scan> {
    let scan = sqlx::query_as::<_, Scan>(
        "INSERT INTO scans (scan_id, locations) VALUES ($1, $2) \
         RETURNING id, scan_id, created, locations",
    )
    .bind(scan_number)
    .bind(Json(vec![location("picoprobe", "/data/raw")]))
    .fetch_one(pool)
    .await?;

    Ok(scan)
}

/// Association rows for a (job, scan) pair.
pub async fn count_links(pool: &PgPool, job_id: i64, scan_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM job_scans WHERE job_id = $1 AND scan_id = $2",
    )
    .bind(job_id)
    .bind(scan_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
