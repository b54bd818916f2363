use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

use super::{JobFilter, JobStore};
use crate::common::{JobId, ScanId};
use crate::domains::jobs::conditional::{UpdateOutcome, UpdatePlan};
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::models::{Job, NewJob, Scan};

const JOB_COLUMNS: &str =
    "id, job_type, machine, slurm_id, state, params, output, elapsed, submit, notes";

/// Job store backed by PostgreSQL.
#[derive(Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter) {
        builder.push(" WHERE TRUE");
        if let Some(slurm_id) = filter.slurm_id {
            builder.push(" AND slurm_id = ");
            builder.push_bind(slurm_id);
        }
        if let Some(job_type) = filter.job_type {
            builder.push(" AND job_type = ");
            builder.push_bind(job_type);
        }
    }

    async fn scan_exists(
        tx: &mut Transaction<'_, Postgres>,
        id: ScanId,
    ) -> Result<bool, JobError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM scans WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(exists)
    }

    /// Insert-if-absent; true when a new association row was written.
    async fn insert_link(
        tx: &mut Transaction<'_, Postgres>,
        job_id: JobId,
        scan_id: ScanId,
    ) -> Result<bool, JobError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO job_scans (job_id, scan_id)
            VALUES ($1, $2)
            ON CONFLICT (job_id, scan_id) DO NOTHING
            "#,
        )
        .bind(job_id)
        .bind(scan_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn find_job(&self, id: JobId) -> Result<Option<Job>, JobError> {
        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {} FROM jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn find_job_by_slurm_id(&self, slurm_id: i64) -> Result<Option<Job>, JobError> {
        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {} FROM jobs WHERE slurm_id = $1 ORDER BY id LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(slurm_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
        let mut builder = QueryBuilder::new(format!("SELECT {} FROM jobs", JOB_COLUMNS));
        Self::push_filters(&mut builder, filter);
        builder.push(" ORDER BY id DESC OFFSET ");
        builder.push_bind(filter.skip);
        builder.push(" LIMIT ");
        builder.push_bind(filter.limit);

        let jobs = builder
            .build_query_as::<Job>()
            .fetch_all(&self.pool)
            .await?;

        Ok(jobs)
    }

    async fn count_jobs(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM jobs");
        Self::push_filters(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn create_job(&self, new_job: &NewJob) -> Result<Job, JobError> {
        let mut tx = self.pool.begin().await?;

        if let Some(scan_id) = new_job.scan_id {
            if !Self::scan_exists(&mut tx, scan_id).await? {
                return Err(JobError::LinkTargetMissing(scan_id));
            }
        }

        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            INSERT INTO jobs (job_type, machine, params)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(new_job.job_type)
        .bind(&new_job.machine)
        .bind(Json(&new_job.params))
        .fetch_one(&mut *tx)
        .await?;

        if let Some(scan_id) = new_job.scan_id {
            Self::insert_link(&mut tx, job.id, scan_id).await?;
        }

        tx.commit().await?;

        Ok(job)
    }

    async fn apply_update(&self, plan: &UpdatePlan) -> Result<UpdateOutcome, JobError> {
        let job_id = plan.job_id();
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM jobs WHERE id = $1)")
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(JobError::job_not_found(job_id));
        }

        // Resolve the link target before writing so a missing scan rolls
        // back the whole patch.
        if let Some(scan_id) = plan.link() {
            if !Self::scan_exists(&mut tx, scan_id).await? {
                return Err(JobError::LinkTargetMissing(scan_id));
            }
        }

        let fields_changed = match plan.to_statement() {
            Some(mut statement) => {
                let rows = statement.build().execute(&mut *tx).await?.rows_affected();
                rows == 1
            }
            None => false,
        };

        let linked = match plan.link() {
            Some(scan_id) => Self::insert_link(&mut tx, job_id, scan_id).await?,
            None => false,
        };

        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {} FROM jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(job_id = %job_id, fields_changed, linked, "Applied conditional update");

        Ok(UpdateOutcome {
            job,
            fields_changed,
            linked,
        })
    }

    async fn scans_for_job(&self, id: JobId) -> Result<Vec<Scan>, JobError> {
        let scans = sqlx::query_as::<_, Scan>(
            r#"
            SELECT s.id, s.scan_id, s.created, s.locations
            FROM scans s
            INNER JOIN job_scans js ON js.scan_id = s.id
            WHERE js.job_id = $1
            ORDER BY js.position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(scans)
    }

    async fn jobs_for_scan(&self, id: ScanId) -> Result<Vec<Job>, JobError> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT j.id, j.job_type, j.machine, j.slurm_id, j.state, j.params,
                   j.output, j.elapsed, j.submit, j.notes
            FROM jobs j
            INNER JOIN job_scans js ON js.job_id = j.id
            WHERE js.scan_id = $1
            ORDER BY j.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn neighbor_ids(
        &self,
        job: &Job,
    ) -> Result<(Option<JobId>, Option<JobId>), JobError> {
        let prev: Option<JobId> = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE job_type = $1 AND id < $2 ORDER BY id DESC LIMIT 1",
        )
        .bind(job.job_type)
        .bind(job.id)
        .fetch_optional(&self.pool)
        .await?;

        let next: Option<JobId> = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE job_type = $1 AND id > $2 ORDER BY id ASC LIMIT 1",
        )
        .bind(job.job_type)
        .bind(job.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok((prev, next))
    }

    async fn ping(&self) -> Result<(), JobError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
