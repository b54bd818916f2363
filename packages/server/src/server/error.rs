use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domains::jobs::errors::JobError;

impl JobError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            JobError::NotFound { .. } | JobError::LinkTargetMissing(_) => StatusCode::NOT_FOUND,
            JobError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            JobError::Database(_) | JobError::Serialization(_) | JobError::Bus(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Errors render as `{"detail": "..."}`. Internal failures are logged and
/// hidden from the client.
impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ScanId;

    #[test]
    fn missing_scan_maps_to_not_found() {
        let err = JobError::LinkTargetMissing(ScanId::from_i64(3));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Scan does not exist: 3");
    }

    #[test]
    fn invalid_input_maps_to_unprocessable() {
        let err = JobError::Invalid("limit must not be negative".to_string());
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn bus_failures_are_internal() {
        let err = JobError::Bus("down".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
