//! Personal and team to-dos.
//!
//! Everyone sees the tasks they created or were given; `tasks.manage`
//! sees the whole board.

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
        .route(ApiUrls::TASKS, get(handle_list_tasks).post(handle_create_task))
        .route(
            ApiUrls::TASK_BY_ID,
            get(handle_get_task)
                .put(handle_update_task)
                .delete(handle_delete_task),
        )
        .route(ApiUrls::TASK_STATUS, put(handle_update_task_status))
}
