use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::job::{Elapsed, JobState};
use crate::common::ScanId;

/// A sparse update. `None` (absent or explicit `null`) leaves the stored
/// value untouched; fields cannot be cleared through a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(strip_option)))]
pub struct JobPatch {
    #[serde(default)]
    pub slurm_id: Option<i64>,
    #[serde(default)]
    pub state: Option<JobState>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub elapsed: Option<Elapsed>,
    #[serde(default)]
    pub submit: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Scan to link the job to. Links are only ever added.
    #[serde(default)]
    pub scan_id: Option<ScanId>,
}

impl JobPatch {
    /// Patch that only links a scan.
    pub fn link(scan_id: ScanId) -> Self {
        Self {
            scan_id: Some(scan_id),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_absent_fields_are_equivalent() {
        let explicit: JobPatch =
            serde_json::from_str(r#"{"state": "RUNNING", "slurm_id": null}"#).unwrap();
        let sparse: JobPatch = serde_json::from_str(r#"{"state": "RUNNING"}"#).unwrap();
        assert_eq!(explicit, sparse);
        assert_eq!(sparse.state, Some(JobState::Running));
        assert_eq!(sparse.slurm_id, None);
    }

    #[test]
    fn link_patch_carries_only_the_scan() {
        let patch = JobPatch::link(ScanId::from_i64(3));
        assert_eq!(patch.scan_id, Some(ScanId::from_i64(3)));
        assert_eq!(
            JobPatch {
                scan_id: None,
                ..patch
            },
            JobPatch::default()
        );
    }

    #[test]
    fn builder_sets_only_named_fields() {
        let patch = JobPatch::builder().notes("ok".to_string()).build();
        assert_eq!(patch.notes.as_deref(), Some("ok"));
        assert!(patch.state.is_none());
    }
}
