use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::ScanId;

/// Where a copy of the scan's raw data lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub host: String,
    pub path: String,
}

/// A scan acquisition. Owned elsewhere; this service only reads it and links
/// jobs to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Scan {
    pub id: ScanId,
    /// Detector-assigned scan number, when known.
    pub scan_id: Option<i64>,
    pub created: DateTime<Utc>,
    #[sqlx(json)]
    pub locations: Vec<Location>,
}
