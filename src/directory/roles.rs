use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::ApiJson;
use crate::core::shared::schema::{roles, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{optional_text, require_text, with_conn};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::{Permission, PermissionSet, ADMIN_ROLE};

use super::types::{CreateRoleRequest, PermissionInfo, RoleRow, RoleView, UpdateRoleRequest};

const ROLE_NAME_MAX: usize = 64;

/// Role pickers on the user form need the list too.
fn require_role_reader(user: &AuthenticatedUser) -> ApiResult<()> {
    if user.has(Permission::UsersManage) {
        return Ok(());
    }
    Ok(user.require(Permission::RolesManage)?)
}

fn validate_permissions(values: &[String]) -> ApiResult<Vec<String>> {
    PermissionSet::parse_strict(values)
        .map(|set| set.to_strings())
        .map_err(|e| ApiError::validation(e.to_string()))
}

fn user_counts(conn: &mut PgConnection) -> QueryResult<HashMap<Uuid, i64>> {
    let rows: Vec<(Uuid, i64)> = users::table
        .group_by(users::role_id)
        .select((users::role_id, diesel::dsl::count_star()))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}

fn load_role_view(conn: &mut PgConnection, id: Uuid) -> ApiResult<RoleView> {
    let role = roles::table
        .find(id)
        .select(RoleRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Role"))?;
    let user_count: i64 = users::table
        .filter(users::role_id.eq(id))
        .count()
        .get_result(conn)?;
    Ok(RoleView { role, user_count })
}

pub async fn handle_list_roles(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<RoleView>>> {
    require_role_reader(&user)?;
    let roles = with_conn(&state.conn, |conn| {
        let counts = user_counts(conn)?;
        let rows = roles::table
            .order(roles::name.asc())
            .select(RoleRow::as_select())
            .load(conn)?;
        Ok(rows
            .into_iter()
            .map(|role| RoleView {
                user_count: counts.get(&role.id).copied().unwrap_or(0),
                role,
            })
            .collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(roles))
}

pub async fn handle_get_role(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RoleView>> {
    require_role_reader(&user)?;
    let role = with_conn(&state.conn, move |conn| load_role_view(conn, id)).await?;
    Ok(Json(role))
}

pub async fn handle_create_role(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleView>)> {
    user.require(Permission::RolesManage)?;
    let name = require_text("name", &req.name, ROLE_NAME_MAX)?;
    let permissions = validate_permissions(&req.permissions)?;
    let description = optional_text(req.description);

    let role = with_conn(&state.conn, move |conn| {
        let now = Utc::now();
        let row = RoleRow {
            id: Uuid::new_v4(),
            name,
            description,
            permissions,
            is_system: false,
            created_at: now,
            updated_at: now,
        };
        let row = diesel::insert_into(roles::table)
            .values(&row)
            .returning(RoleRow::as_returning())
            .get_result(conn)?;
        Ok(RoleView {
            role: row,
            user_count: 0,
        })
    })
    .await?;

    info!("Role '{}' created by {}", role.role.name, user.username);
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn handle_update_role(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> ApiResult<Json<RoleView>> {
    user.require(Permission::RolesManage)?;
    let name = req
        .name
        .as_deref()
        .map(|n| require_text("name", n, ROLE_NAME_MAX))
        .transpose()?;
    let permissions = req
        .permissions
        .as_deref()
        .map(validate_permissions)
        .transpose()?;

    let role = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row: RoleRow = roles::table
                .find(id)
                .select(RoleRow::as_select())
                .for_update()
                .first(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("Role"))?;

            if let Some(name) = name {
                if row.is_system && name != row.name {
                    return Err(ApiError::conflict("System roles cannot be renamed"));
                }
                row.name = name;
            }
            if let Some(permissions) = permissions {
                if row.name == ADMIN_ROLE && permissions.len() != Permission::ALL.len() {
                    return Err(ApiError::conflict(
                        "The Administrator role must keep every permission",
                    ));
                }
                row.permissions = permissions;
            }
            if req.description.is_some() {
                row.description = optional_text(req.description);
            }
            row.updated_at = Utc::now();

            diesel::update(roles::table.find(id)).set(&row).execute(conn)?;
            load_role_view(conn, id)
        })
    })
    .await?;

    Ok(Json(role))
}

pub async fn handle_delete_role(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(Permission::RolesManage)?;

    with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let view = load_role_view(conn, id)?;
            if view.role.is_system {
                return Err(ApiError::conflict("System roles cannot be deleted"));
            }
            if view.user_count > 0 {
                return Err(ApiError::conflict(format!(
                    "Role '{}' is assigned to {} user(s)",
                    view.role.name, view.user_count
                )));
            }
            diesel::delete(roles::table.find(id))
                .execute(conn)
                .map_err(|e| ApiError::from_delete(e, "Role"))?;
            Ok(())
        })
    })
    .await?;

    info!("Role {id} deleted by {}", user.username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_list_permissions(_user: AuthenticatedUser) -> Json<Vec<PermissionInfo>> {
    Json(
        Permission::ALL
            .iter()
            .map(|p| PermissionInfo {
                name: p.as_str(),
                label: p.label(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_permissions_sorts_and_rejects_unknown() {
        let perms = validate_permissions(&["tasks.manage".into(), "finance.view".into()]).unwrap();
        assert_eq!(perms, vec!["finance.view", "tasks.manage"]);

        let err = validate_permissions(&["finance.delete".into()]).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_role_reader_accepts_either_permission() {
        let mut user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            username: "amal".into(),
            role: "Staff".into(),
            permissions: PermissionSet::new(),
        };
        assert!(require_role_reader(&user).is_err());
        user.permissions.insert(Permission::UsersManage);
        assert!(require_role_reader(&user).is_ok());
    }
}
