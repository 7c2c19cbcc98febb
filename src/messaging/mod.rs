//! Participant-only threads, polled by the SPA, with optional LLM summaries.

pub mod messages;
pub mod prompt;
pub mod summary;
pub mod threads;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use messages::*;
pub use summary::handle_summarize_thread;
pub use threads::*;
pub use types::*;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::THREADS,
            get(handle_list_threads).post(handle_create_thread),
        )
        .route(ApiUrls::THREAD_BY_ID, get(handle_get_thread))
        .route(
            ApiUrls::THREAD_MESSAGES,
            get(handle_list_messages).post(handle_post_message),
        )
        .route(ApiUrls::THREAD_READ, post(handle_mark_read))
        .route(ApiUrls::THREAD_PARTICIPANTS, post(handle_add_participants))
        .route(ApiUrls::THREAD_SUMMARY, post(handle_summarize_thread))
}
