use serde::{Deserialize, Serialize};

use crate::common::{JobId, ScanId};
use crate::domains::jobs::data::JobData;
use crate::domains::jobs::models::{Elapsed, Job, JobState, Scan};

/// Kind of an outbound event; selects topic and codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Submit,
    Updated,
    Cancel,
    ScanUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Submit => "job.submit",
            EventKind::Updated => "job.updated",
            EventKind::Cancel => "job.cancel",
            EventKind::ScanUpdated => "scan.updated",
        }
    }
}

/// Events published to downstream consumers.
///
/// These are facts composed from committed state. Payloads are fixed per
/// kind: an update always carries the same projection no matter which
/// fields the patch touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum JobEvent {
    /// A job was created. `scan` is the first linked scan, if any.
    #[serde(rename = "job.submit")]
    Submit { job: JobData, scan: Option<Scan> },

    /// A job changed.
    #[serde(rename = "job.updated")]
    Updated {
        id: JobId,
        slurm_id: Option<i64>,
        state: JobState,
        elapsed: Option<Elapsed>,
    },

    /// Cancellation was requested. Emitted regardless of the job's state.
    #[serde(rename = "job.cancel")]
    Cancel { job: JobData },

    /// The set of jobs linked to a scan, read after the triggering commit.
    #[serde(rename = "scan.updated")]
    ScanUpdated { id: ScanId, jobs: Vec<Job> },
}

impl JobEvent {
    pub fn submitted(job: JobData) -> Self {
        let scan = job.first_scan().cloned();
        JobEvent::Submit { job, scan }
    }

    pub fn updated(job: &Job) -> Self {
        JobEvent::Updated {
            id: job.id,
            slurm_id: job.slurm_id,
            state: job.state,
            elapsed: job.elapsed,
        }
    }

    pub fn cancelled(job: JobData) -> Self {
        JobEvent::Cancel { job }
    }

    pub fn scan_updated(id: ScanId, jobs: Vec<Job>) -> Self {
        JobEvent::ScanUpdated { id, jobs }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            JobEvent::Submit { .. } => EventKind::Submit,
            JobEvent::Updated { .. } => EventKind::Updated,
            JobEvent::Cancel { .. } => EventKind::Cancel,
            JobEvent::ScanUpdated { .. } => EventKind::ScanUpdated,
        }
    }

    /// Bus partition key: the job id, or the scan id for fan-out events.
    pub fn partition_key(&self) -> String {
        match self {
            JobEvent::Submit { job, .. } | JobEvent::Cancel { job } => job.job.id.to_string(),
            JobEvent::Updated { id, .. } => id.to_string(),
            JobEvent::ScanUpdated { id, .. } => id.to_string(),
        }
    }
}
