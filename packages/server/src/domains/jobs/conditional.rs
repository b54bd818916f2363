//! Compare-and-set job updates.
//!
//! A [`JobPatch`] is turned into an [`UpdatePlan`]: one [`FieldWrite`] per
//! supplied scalar field plus an optional scan link. The plan is executed as
//! a single statement guarded by the disjunction of per-field predicates:
//!
//! ```text
//! UPDATE jobs SET a = $a, b = $b
//! WHERE id = $id AND (a IS DISTINCT FROM $a OR b IS DISTINCT FROM $b)
//! ```
//!
//! Either every supplied field is written and the row counts as changed, or
//! nothing is written because every field already holds the requested value.
//! `IS DISTINCT FROM` treats a NULL column as different from any value, which
//! is the "previously unset counts as a change" rule.
//!
//! The in-memory store evaluates the same plan through [`UpdatePlan::apply_to`]
//! so both stores agree on what "changed" means. Timestamps are cut to the
//! microsecond precision PostgreSQL stores before they enter a plan.

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{Postgres, QueryBuilder};

use crate::common::{JobId, ScanId};
use crate::domains::jobs::models::{Elapsed, Job, JobPatch, JobState};

// ============================================================================
// FieldWrite
// ============================================================================

/// A single supplied scalar field and the value it should hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWrite {
    SlurmId(i64),
    State(JobState),
    Output(String),
    Elapsed(Elapsed),
    Submit(DateTime<Utc>),
    Notes(String),
}

impl FieldWrite {
    pub fn column(&self) -> &'static str {
        match self {
            FieldWrite::SlurmId(_) => "slurm_id",
            FieldWrite::State(_) => "state",
            FieldWrite::Output(_) => "output",
            FieldWrite::Elapsed(_) => "elapsed",
            FieldWrite::Submit(_) => "submit",
            FieldWrite::Notes(_) => "notes",
        }
    }

    /// True when the stored value is unset or different from the new one.
    pub fn differs_from(&self, job: &Job) -> bool {
        match self {
            FieldWrite::SlurmId(value) => job.slurm_id != Some(*value),
            FieldWrite::State(value) => job.state != *value,
            FieldWrite::Output(value) => job.output.as_deref() != Some(value.as_str()),
            FieldWrite::Elapsed(value) => job.elapsed != Some(*value),
            FieldWrite::Submit(value) => job.submit != Some(*value),
            FieldWrite::Notes(value) => job.notes.as_deref() != Some(value.as_str()),
        }
    }

    fn write_to(&self, job: &mut Job) {
        match self {
            FieldWrite::SlurmId(value) => job.slurm_id = Some(*value),
            FieldWrite::State(value) => job.state = *value,
            FieldWrite::Output(value) => job.output = Some(value.clone()),
            FieldWrite::Elapsed(value) => job.elapsed = Some(*value),
            FieldWrite::Submit(value) => job.submit = Some(*value),
            FieldWrite::Notes(value) => job.notes = Some(value.clone()),
        }
    }

    fn push_bind(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        match self {
            FieldWrite::SlurmId(value) => builder.push_bind(*value),
            FieldWrite::State(value) => builder.push_bind(*value),
            FieldWrite::Output(value) => builder.push_bind(value.clone()),
            FieldWrite::Elapsed(value) => builder.push_bind(*value),
            FieldWrite::Submit(value) => builder.push_bind(*value),
            FieldWrite::Notes(value) => builder.push_bind(value.clone()),
        };
    }
}

// ============================================================================
// UpdatePlan
// ============================================================================

/// Fractional-second digits kept by a `timestamptz` column.
const TIMESTAMP_DIGITS: u16 = 6;

/// Everything one patch asks of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    job_id: JobId,
    writes: Vec<FieldWrite>,
    link: Option<ScanId>,
}

impl UpdatePlan {
    pub fn from_patch(job_id: JobId, patch: &JobPatch) -> Self {
        let mut writes = Vec::new();

        if let Some(slurm_id) = patch.slurm_id {
            writes.push(FieldWrite::SlurmId(slurm_id));
        }
        if let Some(state) = patch.state {
            writes.push(FieldWrite::State(state));
        }
        if let Some(output) = &patch.output {
            writes.push(FieldWrite::Output(output.clone()));
        }
        if let Some(elapsed) = patch.elapsed {
            writes.push(FieldWrite::Elapsed(elapsed));
        }
        if let Some(submit) = patch.submit {
            writes.push(FieldWrite::Submit(submit.trunc_subsecs(TIMESTAMP_DIGITS)));
        }
        if let Some(notes) = &patch.notes {
            writes.push(FieldWrite::Notes(notes.clone()));
        }

        Self {
            job_id,
            writes,
            link: patch.scan_id,
        }
    }

    /// Plan that only links a scan.
    pub fn link_only(job_id: JobId, scan_id: ScanId) -> Self {
        Self {
            job_id,
            writes: Vec::new(),
            link: Some(scan_id),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn writes(&self) -> &[FieldWrite] {
        &self.writes
    }

    pub fn link(&self) -> Option<ScanId> {
        self.link
    }

    /// Compare-and-set against an in-memory record. Writes every supplied
    /// field when at least one differs; returns whether anything was written.
    pub fn apply_to(&self, job: &mut Job) -> bool {
        if !self.writes.iter().any(|write| write.differs_from(job)) {
            return false;
        }
        for write in &self.writes {
            write.write_to(job);
        }
        true
    }

    /// The guarded UPDATE, or `None` when the patch has no scalar fields.
    pub fn to_statement(&self) -> Option<QueryBuilder<'static, Postgres>> {
        if self.writes.is_empty() {
            return None;
        }

        let mut builder = QueryBuilder::new("UPDATE jobs SET ");
        for (i, write) in self.writes.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(write.column());
            builder.push(" = ");
            write.push_bind(&mut builder);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(self.job_id);
        builder.push(" AND (");
        for (i, write) in self.writes.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(write.column());
            builder.push(" IS DISTINCT FROM ");
            write.push_bind(&mut builder);
        }
        builder.push(")");

        Some(builder)
    }
}

// ============================================================================
// UpdateOutcome
// ============================================================================

/// Result of executing a plan: the reloaded job and what actually happened.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub job: Job,
    /// The guarded scalar statement wrote the row.
    pub fields_changed: bool,
    /// A new scan association was inserted.
    pub linked: bool,
}

impl UpdateOutcome {
    pub fn changed(&self) -> bool {
        self.fields_changed || self.linked
    }
}
