use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use typed_builder::TypedBuilder;

use crate::common::{JobId, ScanId};

// ============================================================================
// Enums
// ============================================================================

/// Kind of work a job performs. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Transfer,
    Count,
    Streaming,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Transfer => "transfer",
            JobType::Count => "count",
            JobType::Streaming => "streaming",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(JobType::Transfer),
            "count" => Ok(JobType::Count),
            "streaming" => Ok(JobType::Streaming),
            other => Err(format!("unknown job type: {}", other)),
        }
    }
}

/// Scheduler lifecycle state, written verbatim from whatever the reporter
/// sends. Transitions are not validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Not a slurm state; every job starts here.
    #[default]
    Initializing,
    BootFail,
    Cancelled,
    Completed,
    Configuring,
    Completing,
    Deadline,
    Failed,
    NodeFail,
    OutOfMemory,
    Pending,
    Preempted,
    Running,
    ResvDelHold,
    RequeueFed,
    RequeueHold,
    Requeued,
    Resizing,
    Revoked,
    Signaling,
    SpecialExit,
    StageOut,
    Stopped,
    Suspended,
    Timeout,
}

// ============================================================================
// Params
// ============================================================================

/// A single job parameter value.
///
/// Integers are tried before floats so `3` stays an integer on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

/// Job parameters, opaque to this service. Ordered so payloads hash stably.
pub type Params = BTreeMap<String, ParamValue>;

// ============================================================================
// Elapsed
// ============================================================================

/// Wall-clock run time reported by the scheduler, in whole seconds.
///
/// Serialized as a number of seconds (float on output, int or float on input).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct Elapsed(i64);

impl Elapsed {
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub const fn as_secs(&self) -> i64 {
        self.0
    }
}

impl Serialize for Elapsed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64)
    }
}

impl<'de> Deserialize<'de> for Elapsed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom(
                "elapsed must be a non-negative number of seconds",
            ));
        }
        Ok(Self(secs.round() as i64))
    }
}

// ============================================================================
// Job Model
// ============================================================================

/// A job record as stored. Scan links live in the association table and are
/// resolved separately (see `JobData`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub machine: String,
    pub slurm_id: Option<i64>,
    pub state: JobState,
    #[sqlx(json)]
    pub params: Params,
    pub output: Option<String>,
    pub elapsed: Option<Elapsed>,
    pub submit: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Job {
    /// Builds the record a fresh submission produces.
    pub fn submitted(id: JobId, new_job: &NewJob) -> Self {
        Self {
            id,
            job_type: new_job.job_type,
            machine: new_job.machine.clone(),
            slurm_id: None,
            state: JobState::default(),
            params: new_job.params.clone(),
            output: None,
            elapsed: None,
            submit: None,
            notes: None,
        }
    }
}

/// Submission input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewJob {
    pub job_type: JobType,
    pub machine: String,
    #[serde(default)]
    #[builder(default)]
    pub params: Params,
    /// Scan to link the job to at creation time.
    #[serde(default)]
    #[builder(default, setter(strip_option))]
    pub scan_id: Option<ScanId>,
}
