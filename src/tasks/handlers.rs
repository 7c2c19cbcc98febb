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
use crate::core::shared::enums::priority_rank;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::query::{ListQuery, Page};
use crate::core::shared::schema::tasks;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{like_pattern, optional_text, require_text, with_conn};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::types::{
    CreateTaskRequest, TaskFilter, TaskRow, TaskStatus, TaskStatusRequest, UpdateTaskRequest,
};

const SORT_KEYS: &[&str] = &["created_at", "due_date", "priority", "title"];
const TITLE_MAX: usize = 200;

/// Who is asking, and whether they may see every task.
#[derive(Debug, Clone, Copy)]
struct Viewer {
    user_id: Uuid,
    sees_all: bool,
}

impl Viewer {
    fn of(user: &AuthenticatedUser) -> Self {
        Self {
            user_id: user.user_id,
            sees_all: user.has(Permission::TasksManage),
        }
    }
}

fn filtered(
    q: &ListQuery,
    filter: &TaskFilter,
    status: Option<TaskStatus>,
    viewer: Viewer,
) -> tasks::BoxedQuery<'static, Pg> {
    let mut query = tasks::table.into_boxed();
    if filter.mine || !viewer.sees_all {
        query = query.filter(
            tasks::created_by
                .eq(viewer.user_id)
                .or(tasks::assignee_id.eq(viewer.user_id)),
        );
    }
    if let Some(term) = q.search_term() {
        query = query.filter(tasks::title.ilike(like_pattern(term)));
    }
    if let Some(status) = status {
        query = query.filter(tasks::status.eq(status.as_str()));
    }
    if let Some(assignee_id) = filter.assignee_id {
        query = query.filter(tasks::assignee_id.eq(assignee_id));
    }
    if let Some(project_id) = filter.project_id {
        query = query.filter(tasks::project_id.eq(project_id));
    }
    query
}

/// Loads a task the viewer may see. Tasks outside their reach read as missing.
fn load_visible(conn: &mut PgConnection, id: Uuid, viewer: Viewer) -> ApiResult<TaskRow> {
    let row: TaskRow = tasks::table
        .find(id)
        .select(TaskRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    if viewer.sees_all || row.is_involved(viewer.user_id) {
        Ok(row)
    } else {
        Err(ApiError::not_found("Task"))
    }
}

fn save(conn: &mut PgConnection, row: &TaskRow) -> ApiResult<TaskRow> {
    Ok(diesel::update(tasks::table.find(row.id))
        .set(row)
        .returning(TaskRow::as_returning())
        .get_result(conn)?)
}

pub async fn handle_list_tasks(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(q): ApiQuery<ListQuery>,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> ApiResult<Json<Page<TaskRow>>> {
    let viewer = Viewer::of(&user);
    let status = q.status_filter::<TaskStatus>()?;
    let sort = q.sort_key(SORT_KEYS)?;

    let page = with_conn(&state.conn, move |conn| {
        let total: i64 = filtered(&q, &filter, status, viewer)
            .count()
            .get_result(conn)?;
        let items = apply_sort!(filtered(&q, &filter, status, viewer), sort, q.order(), {
            "created_at" => tasks::created_at,
            "due_date" => tasks::due_date,
            "priority" => priority_rank(),
            "title" => tasks::title,
        })
        .limit(q.limit())
        .offset(q.offset())
        .select(TaskRow::as_select())
        .load(conn)?;
        Ok(Page::new(items, total, &q))
    })
    .await?;

    Ok(Json(page))
}

pub async fn handle_get_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskRow>> {
    let viewer = Viewer::of(&user);
    let task = with_conn(&state.conn, move |conn| load_visible(conn, id, viewer)).await?;
    Ok(Json(task))
}

pub async fn handle_create_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskRow>)> {
    let title = require_text("title", &req.title, TITLE_MAX)?;

    let now = Utc::now();
    let mut row = TaskRow {
        id: Uuid::new_v4(),
        title,
        description: optional_text(req.description),
        status: String::new(),
        priority: req.priority.unwrap_or_default().as_str().to_string(),
        assignee_id: req.assignee_id,
        project_id: req.project_id,
        due_date: req.due_date,
        created_by: user.user_id,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };
    row.apply_status(req.status.unwrap_or_default(), now);

    let task = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(tasks::table)
            .values(&row)
            .returning(TaskRow::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Task '{}' created by {}", task.title, user.username);
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn handle_update_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<TaskRow>> {
    let viewer = Viewer::of(&user);
    let title = req
        .title
        .as_deref()
        .map(|t| require_text("title", t, TITLE_MAX))
        .transpose()?;

    let task = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row = load_visible(conn, id, viewer)?;
            let now = Utc::now();

            if let Some(title) = title {
                row.title = title;
            }
            if let Some(description) = req.description {
                row.description = optional_text(description);
            }
            if let Some(priority) = req.priority {
                row.priority = priority.as_str().to_string();
            }
            if let Some(assignee_id) = req.assignee_id {
                row.assignee_id = assignee_id;
            }
            if let Some(project_id) = req.project_id {
                row.project_id = project_id;
            }
            if let Some(due_date) = req.due_date {
                row.due_date = due_date;
            }
            match req.status {
                Some(status) => row.apply_status(status, now),
                None => row.updated_at = now,
            }
            save(conn, &row)
        })
    })
    .await?;

    Ok(Json(task))
}

pub async fn handle_update_task_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<TaskStatusRequest>,
) -> ApiResult<Json<TaskRow>> {
    let viewer = Viewer::of(&user);

    let task = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row = load_visible(conn, id, viewer)?;
            row.apply_status(req.status, Utc::now());
            save(conn, &row)
        })
    })
    .await?;

    info!("Task '{}' moved to {} by {}", task.title, task.status, user.username);
    Ok(Json(task))
}

pub async fn handle_delete_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let viewer = Viewer::of(&user);

    with_conn(&state.conn, move |conn| {
        let row = load_visible(conn, id, viewer)?;
        if !viewer.sees_all && row.created_by != viewer.user_id {
            return Err(ApiError::forbidden(
                "Only the creator or a task manager can delete a task",
            ));
        }
        diesel::delete(tasks::table.find(id)).execute(conn)?;
        Ok(())
    })
    .await?;

    info!("Task {id} deleted by {}", user.username);
    Ok(StatusCode::NO_CONTENT)
}
