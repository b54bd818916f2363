//! Jobs domain activities - entry-point business logic
//!
//! Called from the HTTP routes. Activities take parsed input, run the store
//! operation and queue the resulting events once the change is committed.

pub mod cancel;
pub mod emit;
pub mod query;
pub mod submit;
pub mod update;

pub use cancel::cancel_job;
pub use query::{get_job, get_job_by_slurm_id, job_scans, list_jobs, JobPage, JobView};
pub use submit::submit_job;
pub use update::{link_scan, update_job};
