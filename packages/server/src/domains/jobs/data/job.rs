use serde::{Deserialize, Serialize};

use crate::domains::jobs::models::{Job, Scan};

/// Job as presented to callers and events: the stored record plus its scans
/// when they were resolved. `scans` is `null` when not requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    #[serde(flatten)]
    pub job: Job,
    pub scans: Option<Vec<Scan>>,
}

impl JobData {
    pub fn without_scans(job: Job) -> Self {
        Self { job, scans: None }
    }

    pub fn with_scans(job: Job, scans: Vec<Scan>) -> Self {
        Self {
            job,
            scans: Some(scans),
        }
    }

    /// First linked scan, in association order.
    pub fn first_scan(&self) -> Option<&Scan> {
        self.scans.as_ref().and_then(|scans| scans.first())
    }
}

impl From<Job> for JobData {
    fn from(job: Job) -> Self {
        Self::without_scans(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::JobId;
    use crate::domains::jobs::models::{JobType, NewJob};

    #[test]
    fn flattens_job_fields_next_to_scans() {
        let new_job = NewJob::builder()
            .job_type(JobType::Count)
            .machine("m1")
            .build();
        let data = JobData::without_scans(Job::submitted(JobId::from_i64(5), &new_job));
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["id"], 5);
        assert_eq!(value["job_type"], "count");
        assert_eq!(value["state"], "INITIALIZING");
        assert!(value["scans"].is_null());
    }
}
