//! Users, roles and login.

pub mod auth_routes;
pub mod roles;
pub mod types;
pub mod users;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use auth_routes::*;
pub use roles::*;
pub use types::*;
pub use users::*;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::AUTH_LOGIN, post(handle_login))
        .route(ApiUrls::AUTH_ME, get(handle_me))
        .route(ApiUrls::AUTH_PASSWORD, post(handle_change_password))
        .route(
            ApiUrls::USERS,
            get(handle_list_users).post(handle_create_user),
        )
        .route(ApiUrls::USER_DIRECTORY, get(handle_user_directory))
        .route(
            ApiUrls::USER_BY_ID,
            get(handle_get_user)
                .put(handle_update_user)
                .delete(handle_delete_user),
        )
        .route(ApiUrls::USER_RESET_PASSWORD, post(handle_reset_password))
        .route(
            ApiUrls::ROLES,
            get(handle_list_roles).post(handle_create_role),
        )
        .route(
            ApiUrls::ROLE_BY_ID,
            get(handle_get_role)
                .put(handle_update_role)
                .delete(handle_delete_role),
        )
        .route(ApiUrls::PERMISSIONS, get(handle_list_permissions))
}
