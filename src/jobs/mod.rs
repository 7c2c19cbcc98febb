//! Service jobs with `SJ-<year>-<seq>` numbering.

pub mod handlers;
pub mod types;

use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use handlers::*;
pub use types::*;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::JOBS, get(handle_list_jobs).post(handle_create_job))
        .route(
            ApiUrls::JOB_BY_ID,
            get(handle_get_job)
                .put(handle_update_job)
                .delete(handle_delete_job),
        )
        .route(ApiUrls::JOB_STATUS, put(handle_update_job_status))
}
