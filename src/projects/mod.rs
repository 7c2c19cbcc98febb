pub mod handlers;
pub mod types;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use handlers::*;
pub use types::*;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::PROJECTS,
            get(handle_list_projects).post(handle_create_project),
        )
        .route(
            ApiUrls::PROJECT_BY_ID,
            get(handle_get_project)
                .put(handle_update_project)
                .delete(handle_delete_project),
        )
}
