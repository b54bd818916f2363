//! Typed ID definitions for the job and scan entities.
//!
//! ```rust
//! use jobs_core::common::{JobId, ScanId};
//!
//! let job_id = JobId::from_i64(1);
//! let scan_id = ScanId::from_i64(1);
//!
//! // This would be a compile error:
//! // let wrong: ScanId = job_id;
//! # let _ = (job_id, scan_id);
//! ```

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for jobs (transfer, count and streaming runs).
pub struct JobEntity;

/// Marker type for scan acquisitions.
pub struct ScanEntity;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for jobs.
pub type JobId = Id<JobEntity>;

/// Typed ID for scans.
pub type ScanId = Id<ScanEntity>;
