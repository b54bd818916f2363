use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{JobFilter, JobStore};
use crate::common::{JobId, ScanId};
use crate::domains::jobs::conditional::{UpdateOutcome, UpdatePlan};
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::models::{Job, Location, NewJob, Scan};

#[derive(Default)]
struct State {
    jobs: BTreeMap<JobId, Job>,
    scans: BTreeMap<ScanId, Scan>,
    /// (job, scan) pairs in the order they were linked.
    links: Vec<(JobId, ScanId)>,
    last_job_id: i64,
    last_scan_id: i64,
}

impl State {
    fn is_linked(&self, job_id: JobId, scan_id: ScanId) -> bool {
        self.links.contains(&(job_id, scan_id))
    }
}

/// In-process job store.
///
/// Every operation holds one lock for its whole duration, which gives the
/// same all-or-nothing behavior as the PostgreSQL transaction.
#[derive(Default)]
pub struct InMemoryJobStore {
    state: Mutex<State>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a scan (scans are created outside this service).
    pub fn insert_scan(&self, scan_id: Option<i64>, locations: Vec<Location>) -> Scan {
        let mut state = self.lock();
        state.last_scan_id += 1;
        let scan = Scan {
            id: ScanId::from_i64(state.last_scan_id),
            scan_id,
            created: Utc::now(),
            locations,
        };
        state.scans.insert(scan.id, scan.clone());
        scan
    }

    /// Number of association rows for a (job, scan) pair.
    pub fn link_count(&self, job_id: JobId, scan_id: ScanId) -> usize {
        self.lock()
            .links
            .iter()
            .filter(|link| **link == (job_id, scan_id))
            .count()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn find_job(&self, id: JobId) -> Result<Option<Job>, JobError> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn find_job_by_slurm_id(&self, slurm_id: i64) -> Result<Option<Job>, JobError> {
        Ok(self
            .lock()
            .jobs
            .values()
            .find(|job| job.slurm_id == Some(slurm_id))
            .cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
        let skip = usize::try_from(filter.skip).unwrap_or(0);
        let limit = usize::try_from(filter.limit).unwrap_or(0);

        Ok(self
            .lock()
            .jobs
            .values()
            .rev()
            .filter(|job| filter.matches(job))
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_jobs(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let count = self
            .lock()
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .count();
        Ok(count as i64)
    }

    async fn create_job(&self, new_job: &NewJob) -> Result<Job, JobError> {
        let mut state = self.lock();

        if let Some(scan_id) = new_job.scan_id {
            if !state.scans.contains_key(&scan_id) {
                return Err(JobError::LinkTargetMissing(scan_id));
            }
        }

        state.last_job_id += 1;
        let job = Job::submitted(JobId::from_i64(state.last_job_id), new_job);
        state.jobs.insert(job.id, job.clone());

        if let Some(scan_id) = new_job.scan_id {
            state.links.push((job.id, scan_id));
        }

        Ok(job)
    }

    async fn apply_update(&self, plan: &UpdatePlan) -> Result<UpdateOutcome, JobError> {
        let job_id = plan.job_id();
        let mut state = self.lock();

        if !state.jobs.contains_key(&job_id) {
            return Err(JobError::job_not_found(job_id));
        }
        if let Some(scan_id) = plan.link() {
            if !state.scans.contains_key(&scan_id) {
                return Err(JobError::LinkTargetMissing(scan_id));
            }
        }

        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| JobError::job_not_found(job_id))?;
        let fields_changed = plan.apply_to(job);
        let job = job.clone();

        let linked = match plan.link() {
            Some(scan_id) if !state.is_linked(job_id, scan_id) => {
                state.links.push((job_id, scan_id));
                true
            }
            _ => false,
        };

        Ok(UpdateOutcome {
            job,
            fields_changed,
            linked,
        })
    }

    async fn scans_for_job(&self, id: JobId) -> Result<Vec<Scan>, JobError> {
        let state = self.lock();
        let scans = state
            .links
            .iter()
            .filter(|(job_id, _)| *job_id == id)
            .filter_map(|(_, scan_id)| state.scans.get(scan_id).cloned())
            .collect();
        Ok(scans)
    }

    async fn jobs_for_scan(&self, id: ScanId) -> Result<Vec<Job>, JobError> {
        let state = self.lock();
        let jobs = state
            .jobs
            .values()
            .filter(|job| state.is_linked(job.id, id))
            .cloned()
            .collect();
        Ok(jobs)
    }

    async fn neighbor_ids(
        &self,
        job: &Job,
    ) -> Result<(Option<JobId>, Option<JobId>), JobError> {
        let state = self.lock();
        let same_type = |other: &&Job| other.job_type == job.job_type;

        let prev = state
            .jobs
            .range(..job.id)
            .map(|(_, other)| other)
            .filter(same_type)
            .next_back()
            .map(|other| other.id);
        let next = state
            .jobs
            .range(job.id..)
            .map(|(_, other)| other)
            .filter(|other| other.id > job.id)
            .find(same_type)
            .map(|other| other.id);

        Ok((prev, next))
    }

    async fn ping(&self) -> Result<(), JobError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::jobs::models::{JobPatch, JobState, JobType};

    fn new_job(job_type: JobType) -> NewJob {
        NewJob::builder().job_type(job_type).machine("m1").build()
    }

    #[tokio::test]
    async fn ids_are_assigned_monotonically() {
        let store = InMemoryJobStore::new();
        let a = store.create_job(&new_job(JobType::Count)).await.unwrap();
        let b = store.create_job(&new_job(JobType::Count)).await.unwrap();
        assert!(a.id < b.id);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filtered() {
        let store = InMemoryJobStore::new();
        store.create_job(&new_job(JobType::Count)).await.unwrap();
        store.create_job(&new_job(JobType::Transfer)).await.unwrap();
        let newest = store.create_job(&new_job(JobType::Count)).await.unwrap();

        let filter = JobFilter {
            job_type: Some(JobType::Count),
            ..JobFilter::default()
        };
        let jobs = store.list_jobs(&filter).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, newest.id);
        assert_eq!(store.count_jobs(&filter).await.unwrap(), 2);
        assert_eq!(store.count_jobs(&JobFilter::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn paging_does_not_affect_count() {
        let store = InMemoryJobStore::new();
        for _ in 0..5 {
            store.create_job(&new_job(JobType::Count)).await.unwrap();
        }
        let filter = JobFilter {
            skip: 1,
            limit: 2,
            ..JobFilter::default()
        };
        let jobs = store.list_jobs(&filter).await.unwrap();
        assert_eq!(
            jobs.iter().map(|job| job.id.into_i64()).collect::<Vec<_>>(),
            vec![4, 3]
        );
        assert_eq!(store.count_jobs(&filter).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn missing_scan_rejects_create_without_inserting() {
        let store = InMemoryJobStore::new();
        let mut seeded = new_job(JobType::Count);
        seeded.scan_id = Some(ScanId::from_i64(99));

        let err = store.create_job(&seeded).await.unwrap_err();
        assert!(matches!(err, JobError::LinkTargetMissing(_)));
        assert_eq!(store.count_jobs(&JobFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn relinking_is_a_no_op() {
        let store = InMemoryJobStore::new();
        let scan = store.insert_scan(Some(1), vec![]);
        let job = store.create_job(&new_job(JobType::Count)).await.unwrap();

        let plan = UpdatePlan::link_only(job.id, scan.id);
        assert!(store.apply_update(&plan).await.unwrap().linked);
        assert!(!store.apply_update(&plan).await.unwrap().linked);
        assert_eq!(store.link_count(job.id, scan.id), 1);
    }

    #[tokio::test]
    async fn missing_link_target_leaves_fields_untouched() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(&new_job(JobType::Count)).await.unwrap();
        let patch = JobPatch::builder()
            .state(JobState::Running)
            .scan_id(ScanId::from_i64(42))
            .build();

        let err = store
            .apply_update(&UpdatePlan::from_patch(job.id, &patch))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::LinkTargetMissing(_)));

        let stored = store.find_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Initializing);
    }

    #[tokio::test]
    async fn scans_keep_link_order() {
        let store = InMemoryJobStore::new();
        let first = store.insert_scan(Some(10), vec![]);
        let second = store.insert_scan(Some(20), vec![]);
        let job = store.create_job(&new_job(JobType::Transfer)).await.unwrap();

        store
            .apply_update(&UpdatePlan::link_only(job.id, second.id))
            .await
            .unwrap();
        store
            .apply_update(&UpdatePlan::link_only(job.id, first.id))
            .await
            .unwrap();

        let scans = store.scans_for_job(job.id).await.unwrap();
        assert_eq!(scans, vec![second, first]);
    }
}
