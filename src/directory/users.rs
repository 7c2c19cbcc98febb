use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use log::{error, info};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::apply_sort;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::query::{ListQuery, Page};
use crate::core::shared::schema::{roles, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{like_pattern, require_text, with_conn};
use crate::security::auth::AuthenticatedUser;
use crate::security::password::{generate_temporary_password, hash_password, PasswordPolicy};
use crate::security::permissions::Permission;

use super::types::{
    normalize_email, normalize_username, CreateUserRequest, DirectoryEntry, ResetPasswordResponse,
    UpdateUserRequest, UserRow, UserStatus, UserView, NAME_MAX,
};

const SORT_KEYS: &[&str] = &["created_at", "username", "full_name", "last_login_at"];

pub(crate) fn role_names(
    conn: &mut PgConnection,
    role_ids: &[Uuid],
) -> QueryResult<HashMap<Uuid, String>> {
    let rows: Vec<(Uuid, String)> = roles::table
        .filter(roles::id.eq_any(role_ids))
        .select((roles::id, roles::name))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}

pub(crate) fn to_views(conn: &mut PgConnection, rows: Vec<UserRow>) -> QueryResult<Vec<UserView>> {
    let ids: Vec<Uuid> = rows.iter().map(|u| u.role_id).collect();
    let names = role_names(conn, &ids)?;
    Ok(rows
        .into_iter()
        .map(|user| {
            let role_name = names.get(&user.role_id).cloned().unwrap_or_default();
            UserView { user, role_name }
        })
        .collect())
}

pub(crate) fn load_user_view(conn: &mut PgConnection, id: Uuid) -> ApiResult<UserView> {
    let user = users::table
        .find(id)
        .select(UserRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("User"))?;
    let mut views = to_views(conn, vec![user])?;
    views.pop().ok_or_else(|| ApiError::not_found("User"))
}

fn ensure_role_exists(conn: &mut PgConnection, role_id: Uuid) -> ApiResult<()> {
    let exists: bool = diesel::select(diesel::dsl::exists(roles::table.find(role_id)))
        .get_result(conn)?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::validation(format!("Role {role_id} does not exist")))
    }
}

fn filtered(q: &ListQuery, status: Option<UserStatus>) -> users::BoxedQuery<'static, Pg> {
    let mut query = users::table.into_boxed();
    if let Some(term) = q.search_term() {
        let pattern = like_pattern(term);
        query = query.filter(
            users::username
                .ilike(pattern.clone())
                .or(users::email.ilike(pattern.clone()))
                .or(users::full_name.ilike(pattern)),
        );
    }
    if let Some(status) = status {
        query = query.filter(users::is_active.eq(status.is_active()));
    }
    query
}

pub async fn handle_list_users(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(q): ApiQuery<ListQuery>,
) -> ApiResult<Json<Page<UserView>>> {
    user.require(Permission::UsersManage)?;
    let status = q.status_filter::<UserStatus>()?;
    let sort = q.sort_key(SORT_KEYS)?;

    let page = with_conn(&state.conn, move |conn| {
        let total: i64 = filtered(&q, status).count().get_result(conn)?;
        let rows = apply_sort!(filtered(&q, status), sort, q.order(), {
            "created_at" => users::created_at,
            "username" => users::username,
            "full_name" => users::full_name,
            "last_login_at" => users::last_login_at,
        })
        .limit(q.limit())
        .offset(q.offset())
        .select(UserRow::as_select())
        .load(conn)?;
        Ok(Page::new(to_views(conn, rows)?, total, &q))
    })
    .await?;

    Ok(Json(page))
}

/// Active users for participant and assignee pickers.
pub async fn handle_user_directory(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<Vec<DirectoryEntry>>> {
    let entries = with_conn(&state.conn, |conn| {
        Ok(users::table
            .filter(users::is_active.eq(true))
            .order(users::full_name.asc())
            .select(DirectoryEntry::as_select())
            .load(conn)?)
    })
    .await?;
    Ok(Json(entries))
}

pub async fn handle_create_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    user.require(Permission::UsersManage)?;

    let username = normalize_username(&req.username)?;
    let email = normalize_email(&req.email)?;
    let full_name = require_text("full_name", &req.full_name, NAME_MAX)?;
    PasswordPolicy::default()
        .enforce(&req.password, Some(&username))
        .map_err(ApiError::Validation)?;

    let created = with_conn(&state.conn, move |conn| {
        ensure_role_exists(conn, req.role_id)?;
        let password_hash = hash_password(&req.password).map_err(|e| {
            error!("[USER_CREATE] {e}");
            ApiError::Internal(e.to_string())
        })?;
        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            username,
            email,
            full_name,
            password_hash,
            role_id: req.role_id,
            is_active: req.is_active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let row = diesel::insert_into(users::table)
            .values(&row)
            .returning(UserRow::as_returning())
            .get_result(conn)?;
        load_user_view(conn, row.id)
    })
    .await?;

    info!("User {} created by {}", created.user.username, user.username);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn handle_get_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserView>> {
    user.require_self_or(id, Permission::UsersManage)?;
    let view = with_conn(&state.conn, move |conn| load_user_view(conn, id)).await?;
    Ok(Json(view))
}

pub async fn handle_update_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<UserView>> {
    user.require(Permission::UsersManage)?;
    if id == user.user_id && req.is_active == Some(false) {
        return Err(ApiError::validation("You cannot deactivate your own account"));
    }
    let email = req.email.as_deref().map(normalize_email).transpose()?;
    let full_name = req
        .full_name
        .as_deref()
        .map(|n| require_text("full_name", n, NAME_MAX))
        .transpose()?;

    let updated = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row: UserRow = users::table
                .find(id)
                .select(UserRow::as_select())
                .for_update()
                .first(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("User"))?;

            if let Some(email) = email {
                row.email = email;
            }
            if let Some(full_name) = full_name {
                row.full_name = full_name;
            }
            if let Some(role_id) = req.role_id {
                ensure_role_exists(conn, role_id)?;
                row.role_id = role_id;
            }
            if let Some(is_active) = req.is_active {
                row.is_active = is_active;
            }
            row.updated_at = Utc::now();

            diesel::update(users::table.find(id))
                .set(&row)
                .execute(conn)?;
            load_user_view(conn, id)
        })
    })
    .await?;

    Ok(Json(updated))
}

pub async fn handle_delete_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(Permission::UsersManage)?;
    if id == user.user_id {
        return Err(ApiError::validation("You cannot delete your own account"));
    }

    let deleted = with_conn(&state.conn, move |conn| {
        diesel::delete(users::table.find(id))
            .execute(conn)
            .map_err(|e| ApiError::from_delete(e, "User"))
    })
    .await?;

    if deleted == 0 {
        return Err(ApiError::not_found("User"));
    }
    info!("User {id} deleted by {}", user.username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_reset_password(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ResetPasswordResponse>> {
    user.require(Permission::UsersManage)?;

    let temporary_password = generate_temporary_password(14);
    let password = temporary_password.clone();
    let username = with_conn(&state.conn, move |conn| {
        let password_hash = hash_password(&password).map_err(|e| {
            error!("[USER_RESET_PASSWORD] {e}");
            ApiError::Internal(e.to_string())
        })?;
        let username: String = diesel::update(users::table.find(id))
            .set((
                users::password_hash.eq(password_hash),
                users::updated_at.eq(Utc::now()),
            ))
            .returning(users::username)
            .get_result(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("User"))?;
        Ok(username)
    })
    .await?;

    info!("Password for {username} reset by {}", user.username);
    Ok(Json(ResetPasswordResponse {
        user_id: id,
        username,
        temporary_password,
    }))
}
