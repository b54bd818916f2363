pub mod job;
pub mod patch;
pub mod scan;

pub use job::{Elapsed, Job, JobState, JobType, NewJob, ParamValue, Params};
pub use patch::JobPatch;
pub use scan::{Location, Scan};
