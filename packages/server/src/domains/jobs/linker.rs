//! Job ↔ scan association.
//!
//! Links are additive: there is no unlink. Linking a scan that is already
//! attached reports no change and writes nothing.

use std::sync::Arc;

use crate::common::{JobId, ScanId};
use crate::domains::jobs::conditional::UpdatePlan;
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::models::Scan;
use crate::domains::jobs::store::JobStore;

#[derive(Clone)]
pub struct ScanLinker {
    store: Arc<dyn JobStore>,
}

impl ScanLinker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Attach `scan_id` to the job. Returns whether a new link was added.
    pub async fn link(&self, job_id: JobId, scan_id: ScanId) -> Result<bool, JobError> {
        let outcome = self
            .store
            .apply_update(&UpdatePlan::link_only(job_id, scan_id))
            .await?;
        Ok(outcome.linked)
    }

    /// Scans attached to the job, in the order they were linked.
    pub async fn list_scans(&self, job_id: JobId) -> Result<Vec<Scan>, JobError> {
        self.store.scans_for_job(job_id).await
    }
}
