use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use diesel::prelude::*;
use log::{error, info, warn};
use std::sync::Arc;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::ApiJson;
use crate::core::shared::schema::{roles, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::security::auth::{AuthError, AuthenticatedUser};
use crate::security::password::{hash_password, verify_decoy, verify_password, PasswordPolicy};
use crate::security::permissions::PermissionSet;

use super::types::{
    ChangePasswordRequest, CurrentUserResponse, LoginRequest, LoginResponse, UserRow,
};
use super::users::load_user_view;

fn role_permissions(conn: &mut PgConnection, role_id: uuid::Uuid) -> QueryResult<Vec<String>> {
    let stored: Vec<String> = roles::table
        .find(role_id)
        .select(roles::permissions)
        .first(conn)?;
    Ok(PermissionSet::from_stored(&stored).to_strings())
}

fn password_error(tag: &str, e: anyhow::Error) -> ApiError {
    error!("[{tag}] {e}");
    ApiError::Internal(e.to_string())
}

pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let username = req.username.trim().to_lowercase();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }

    let (view, permissions) = with_conn(&state.conn, move |conn| {
        let user: Option<UserRow> = users::table
            .filter(users::username.eq(&username))
            .select(UserRow::as_select())
            .first(conn)
            .optional()?;

        let Some(user) = user else {
            verify_decoy(&req.password);
            warn!("Login failed for unknown user '{username}'");
            return Err(AuthError::InvalidCredentials.into());
        };
        let valid = verify_password(&req.password, &user.password_hash)
            .map_err(|e| password_error("AUTH_LOGIN", e))?;
        if !valid {
            warn!("Login failed for '{username}': wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active {
            warn!("Login refused for disabled account '{username}'");
            return Err(AuthError::AccountDisabled.into());
        }

        diesel::update(users::table.find(user.id))
            .set(users::last_login_at.eq(Some(Utc::now())))
            .execute(conn)?;

        let permissions = role_permissions(conn, user.role_id)?;
        Ok((load_user_view(conn, user.id)?, permissions))
    })
    .await?;

    let issued = state
        .jwt_manager
        .issue(
            view.user.id,
            &view.user.username,
            &view.role_name,
            permissions.clone(),
        )
        .map_err(|e| password_error("AUTH_LOGIN", e))?;

    info!("User {} logged in", view.user.username);
    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: issued.token_type,
        expires_at: issued.expires_at,
        user: view,
        permissions,
    }))
}

pub async fn handle_me(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> ApiResult<Json<CurrentUserResponse>> {
    let user_id = user.user_id;
    let response = with_conn(&state.conn, move |conn| {
        let view = load_user_view(conn, user_id)
            .map_err(|_| ApiError::Unauthorized("Account no longer exists".into()))?;
        if !view.user.is_active {
            return Err(AuthError::AccountDisabled.into());
        }
        let permissions = role_permissions(conn, view.user.role_id)?;
        Ok(CurrentUserResponse {
            user: view,
            permissions,
        })
    })
    .await?;
    Ok(Json(response))
}

pub async fn handle_change_password(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    PasswordPolicy::default()
        .enforce(&req.new_password, Some(&user.username))
        .map_err(ApiError::Validation)?;
    if req.new_password == req.current_password {
        return Err(ApiError::validation(
            "New password must differ from the current password",
        ));
    }

    let user_id = user.user_id;
    with_conn(&state.conn, move |conn| {
        let current_hash: String = users::table
            .find(user_id)
            .select(users::password_hash)
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("User"))?;

        let valid = verify_password(&req.current_password, &current_hash)
            .map_err(|e| password_error("AUTH_PASSWORD", e))?;
        if !valid {
            return Err(ApiError::validation("Current password is incorrect"));
        }

        let new_hash =
            hash_password(&req.new_password).map_err(|e| password_error("AUTH_PASSWORD", e))?;
        diesel::update(users::table.find(user_id))
            .set((
                users::password_hash.eq(new_hash),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    info!("User {} changed their password", user.username);
    Ok(StatusCode::NO_CONTENT)
}
