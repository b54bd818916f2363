//! Application setup and router configuration.

use axum::{
    extract::Extension,
    routing::{get, put},
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::routes::{
    cancel_job_handler, create_job_handler, get_job_handler, health_handler,
    job_by_slurm_id_handler, job_scans_handler, link_scan_handler, list_jobs_handler,
    update_job_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub deps: ServerDeps,
    /// Present when backed by PostgreSQL; used for pool metrics on /health
    pub db_pool: Option<PgPool>,
}

/// Job routes, relative to the API prefix.
pub fn jobs_router() -> Router {
    Router::new()
        .route("/jobs", get(list_jobs_handler).post(create_job_handler))
        .route("/jobs/:id", get(get_job_handler).patch(update_job_handler))
        .route("/jobs/:id/scans", get(job_scans_handler))
        .route("/jobs/:id/scans/:scan_id", put(link_scan_handler))
        .route("/jobs/:id/cancel", put(cancel_job_handler))
        .route("/jobs/slurm/:slurm_id", get(job_by_slurm_id_handler))
}

/// Build the Axum application router
pub fn build_app(deps: ServerDeps, db_pool: Option<PgPool>) -> Router {
    let app_state = AxumAppState { deps, db_pool };

    Router::new()
        .nest("/api/v1", jobs_router())
        .route("/health", get(health_handler))
        .layer(Extension(app_state))
        .layer(TraceLayer::new_for_http())
}
