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
            ApiUrls::ANNOUNCEMENTS,
            get(handle_list_announcements).post(handle_create_announcement),
        )
        .route(
            ApiUrls::ANNOUNCEMENT_BY_ID,
            get(handle_get_announcement)
                .put(handle_update_announcement)
                .delete(handle_delete_announcement),
        )
}
