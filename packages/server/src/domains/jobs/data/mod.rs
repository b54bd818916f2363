pub mod job;

pub use job::JobData;
