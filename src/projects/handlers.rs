use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::apply_sort;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::query::{ListQuery, Page};
use crate::core::shared::schema::{payment_instructions, projects, service_jobs};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{like_pattern, optional_text, require_text, with_conn};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::types::{
    normalize_code, validate_dates, CreateProjectRequest, ProjectRow, ProjectStatus,
    UpdateProjectRequest,
};

const SORT_KEYS: &[&str] = &["created_at", "code", "name", "status", "start_date"];
const NAME_MAX: usize = 200;

fn filtered(q: &ListQuery, status: Option<ProjectStatus>) -> projects::BoxedQuery<'static, Pg> {
    let mut query = projects::table.into_boxed();
    if let Some(term) = q.search_term() {
        let pattern = like_pattern(term);
        query = query.filter(
            projects::code
                .ilike(pattern.clone())
                .or(projects::name.ilike(pattern.clone()))
                .or(projects::client_name.ilike(pattern)),
        );
    }
    if let Some(status) = status {
        query = query.filter(projects::status.eq(status.as_str()));
    }
    query
}

fn load_project(conn: &mut PgConnection, id: Uuid) -> ApiResult<ProjectRow> {
    projects::table
        .find(id)
        .select(ProjectRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Project"))
}

pub async fn handle_list_projects(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    ApiQuery(q): ApiQuery<ListQuery>,
) -> ApiResult<Json<Page<ProjectRow>>> {
    let status = q.status_filter::<ProjectStatus>()?;
    let sort = q.sort_key(SORT_KEYS)?;

    let page = with_conn(&state.conn, move |conn| {
        let total: i64 = filtered(&q, status).count().get_result(conn)?;
        let items = apply_sort!(filtered(&q, status), sort, q.order(), {
            "created_at" => projects::created_at,
            "code" => projects::code,
            "name" => projects::name,
            "status" => projects::status,
            "start_date" => projects::start_date,
        })
        .limit(q.limit())
        .offset(q.offset())
        .select(ProjectRow::as_select())
        .load(conn)?;
        Ok(Page::new(items, total, &q))
    })
    .await?;

    Ok(Json(page))
}

pub async fn handle_get_project(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectRow>> {
    let project = with_conn(&state.conn, move |conn| load_project(conn, id)).await?;
    Ok(Json(project))
}

pub async fn handle_create_project(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectRow>)> {
    user.require(Permission::ProjectsManage)?;
    let code = normalize_code(&req.code)?;
    let name = require_text("name", &req.name, NAME_MAX)?;
    validate_dates(req.start_date, req.end_date)?;

    let now = Utc::now();
    let row = ProjectRow {
        id: Uuid::new_v4(),
        code,
        name,
        client_name: optional_text(req.client_name),
        description: optional_text(req.description),
        status: req.status.unwrap_or_default().as_str().to_string(),
        manager_id: req.manager_id,
        start_date: req.start_date,
        end_date: req.end_date,
        created_at: now,
        updated_at: now,
    };

    let project = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(projects::table)
            .values(&row)
            .returning(ProjectRow::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Project {} created by {}", project.code, user.username);
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn handle_update_project(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectRow>> {
    user.require(Permission::ProjectsManage)?;
    let code = req.code.as_deref().map(normalize_code).transpose()?;
    let name = req
        .name
        .as_deref()
        .map(|n| require_text("name", n, NAME_MAX))
        .transpose()?;

    let project = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row = load_project(conn, id)?;

            if let Some(code) = code {
                row.code = code;
            }
            if let Some(name) = name {
                row.name = name;
            }
            if let Some(client_name) = req.client_name {
                row.client_name = optional_text(client_name);
            }
            if let Some(description) = req.description {
                row.description = optional_text(description);
            }
            if let Some(status) = req.status {
                row.status = status.as_str().to_string();
            }
            if let Some(manager_id) = req.manager_id {
                row.manager_id = manager_id;
            }
            if let Some(start_date) = req.start_date {
                row.start_date = start_date;
            }
            if let Some(end_date) = req.end_date {
                row.end_date = end_date;
            }
            validate_dates(row.start_date, row.end_date)?;
            row.updated_at = Utc::now();

            Ok(diesel::update(projects::table.find(id))
                .set(&row)
                .returning(ProjectRow::as_returning())
                .get_result(conn)?)
        })
    })
    .await?;

    Ok(Json(project))
}

pub async fn handle_delete_project(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(Permission::ProjectsManage)?;

    with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            load_project(conn, id)?;
            let jobs: i64 = service_jobs::table
                .filter(service_jobs::project_id.eq(id))
                .count()
                .get_result(conn)?;
            let payments: i64 = payment_instructions::table
                .filter(payment_instructions::project_id.eq(id))
                .count()
                .get_result(conn)?;
            if jobs > 0 || payments > 0 {
                return Err(ApiError::conflict(format!(
                    "Project is referenced by {jobs} job(s) and {payments} payment(s)"
                )));
            }
            diesel::delete(projects::table.find(id))
                .execute(conn)
                .map_err(|e| ApiError::from_delete(e, "Project"))?;
            Ok(())
        })
    })
    .await?;

    info!("Project {id} deleted by {}", user.username);
    Ok(StatusCode::NO_CONTENT)
}
