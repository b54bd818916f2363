pub mod activities;
pub mod conditional;
pub mod data;
pub mod errors;
pub mod events;
pub mod linker;
pub mod models;
pub mod navigator;
pub mod store;

pub use conditional::{UpdateOutcome, UpdatePlan};
pub use data::JobData;
pub use errors::JobError;
pub use events::{EventKind, JobEvent};
pub use linker::ScanLinker;
pub use models::{Job, JobPatch, JobState, JobType, NewJob, Scan};
pub use navigator::Neighbors;
pub use store::{InMemoryJobStore, JobFilter, JobStore, PostgresJobStore};
