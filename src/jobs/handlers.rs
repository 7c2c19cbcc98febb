use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::apply_sort;
use crate::core::shared::enums::priority_rank;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::query::{ListQuery, Page};
use crate::core::shared::schema::service_jobs;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    like_pattern, next_sequence, optional_text, require_text, sequence_reference, with_conn,
    with_sequence_retry,
};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::types::{
    CreateJobRequest, JobFilter, JobRow, JobStatus, JobStatusRequest, UpdateJobRequest,
    JOB_NUMBER_PREFIX,
};

const SORT_KEYS: &[&str] = &[
    "created_at",
    "job_number",
    "scheduled_date",
    "status",
    "priority",
    "title",
];
const TITLE_MAX: usize = 200;

fn filtered(
    q: &ListQuery,
    filter: &JobFilter,
    status: Option<JobStatus>,
) -> service_jobs::BoxedQuery<'static, Pg> {
    let mut query = service_jobs::table.into_boxed();
    if let Some(term) = q.search_term() {
        let pattern = like_pattern(term);
        query = query.filter(
            service_jobs::job_number
                .ilike(pattern.clone())
                .or(service_jobs::title.ilike(pattern.clone()))
                .or(service_jobs::customer_name.ilike(pattern.clone()))
                .or(service_jobs::location.ilike(pattern)),
        );
    }
    if let Some(status) = status {
        query = query.filter(service_jobs::status.eq(status.as_str()));
    }
    if let Some(project_id) = filter.project_id {
        query = query.filter(service_jobs::project_id.eq(project_id));
    }
    if let Some(assigned_to) = filter.assigned_to {
        query = query.filter(service_jobs::assigned_to.eq(assigned_to));
    }
    query
}

fn load_job(conn: &mut PgConnection, id: Uuid) -> ApiResult<JobRow> {
    service_jobs::table
        .find(id)
        .select(JobRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Job"))
}

/// Locks the row until the surrounding transaction ends, so workflow
/// checks see the committed status.
fn load_job_for_update(conn: &mut PgConnection, id: Uuid) -> ApiResult<JobRow> {
    service_jobs::table
        .find(id)
        .select(JobRow::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Job"))
}

fn next_job_number(conn: &mut PgConnection, year: i32) -> ApiResult<String> {
    let prefix = format!("{JOB_NUMBER_PREFIX}-{year}-");
    let existing: Vec<String> = service_jobs::table
        .filter(service_jobs::job_number.like(format!("{prefix}%")))
        .select(service_jobs::job_number)
        .load(conn)?;
    Ok(sequence_reference(
        JOB_NUMBER_PREFIX,
        year,
        next_sequence(&prefix, &existing),
    ))
}

pub async fn handle_list_jobs(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(q): ApiQuery<ListQuery>,
    ApiQuery(filter): ApiQuery<JobFilter>,
) -> ApiResult<Json<Page<JobRow>>> {
    user.require(Permission::JobsView)?;
    let status = q.status_filter::<JobStatus>()?;
    let sort = q.sort_key(SORT_KEYS)?;

    let page = with_conn(&state.conn, move |conn| {
        let total: i64 = filtered(&q, &filter, status).count().get_result(conn)?;
        let items = apply_sort!(filtered(&q, &filter, status), sort, q.order(), {
            "created_at" => service_jobs::created_at,
            "job_number" => service_jobs::job_number,
            "scheduled_date" => service_jobs::scheduled_date,
            "status" => service_jobs::status,
            "priority" => priority_rank(),
            "title" => service_jobs::title,
        })
        .limit(q.limit())
        .offset(q.offset())
        .select(JobRow::as_select())
        .load(conn)?;
        Ok(Page::new(items, total, &q))
    })
    .await?;

    Ok(Json(page))
}

pub async fn handle_get_job(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobRow>> {
    user.require(Permission::JobsView)?;
    let job = with_conn(&state.conn, move |conn| load_job(conn, id)).await?;
    Ok(Json(job))
}

pub async fn handle_create_job(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<JobRow>)> {
    user.require(Permission::JobsManage)?;
    let title = require_text("title", &req.title, TITLE_MAX)?;

    let now = Utc::now();
    let mut row = JobRow {
        id: Uuid::new_v4(),
        job_number: String::new(),
        project_id: req.project_id,
        title,
        description: optional_text(req.description),
        customer_name: optional_text(req.customer_name),
        location: optional_text(req.location),
        status: JobStatus::Open.as_str().to_string(),
        priority: req.priority.unwrap_or_default().as_str().to_string(),
        assigned_to: req.assigned_to,
        scheduled_date: req.scheduled_date,
        completed_at: None,
        created_by: user.user_id,
        created_at: now,
        updated_at: now,
    };

    let job = with_conn(&state.conn, move |conn| {
        with_sequence_retry(|| {
            conn.transaction(|conn| {
                row.job_number = next_job_number(conn, now.year())?;
                Ok(diesel::insert_into(service_jobs::table)
                    .values(&row)
                    .returning(JobRow::as_returning())
                    .get_result(conn)?)
            })
        })
    })
    .await?;

    info!("Job {} created by {}", job.job_number, user.username);
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn handle_update_job(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateJobRequest>,
) -> ApiResult<Json<JobRow>> {
    user.require(Permission::JobsManage)?;
    let title = req
        .title
        .as_deref()
        .map(|t| require_text("title", t, TITLE_MAX))
        .transpose()?;

    let job = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row = load_job_for_update(conn, id)?;
            if row.status()?.is_terminal() {
                return Err(ApiError::conflict(format!(
                    "Job {} is {} and can no longer be edited",
                    row.job_number, row.status
                )));
            }

            if let Some(title) = title {
                row.title = title;
            }
            if let Some(project_id) = req.project_id {
                row.project_id = project_id;
            }
            if let Some(description) = req.description {
                row.description = optional_text(description);
            }
            if let Some(customer_name) = req.customer_name {
                row.customer_name = optional_text(customer_name);
            }
            if let Some(location) = req.location {
                row.location = optional_text(location);
            }
            if let Some(priority) = req.priority {
                row.priority = priority.as_str().to_string();
            }
            if let Some(assigned_to) = req.assigned_to {
                row.assigned_to = assigned_to;
            }
            if let Some(scheduled_date) = req.scheduled_date {
                row.scheduled_date = scheduled_date;
            }
            row.updated_at = Utc::now();

            Ok(diesel::update(service_jobs::table.find(id))
                .set(&row)
                .returning(JobRow::as_returning())
                .get_result(conn)?)
        })
    })
    .await?;

    Ok(Json(job))
}

pub async fn handle_update_job_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<JobStatusRequest>,
) -> ApiResult<Json<JobRow>> {
    let can_manage = user.has(Permission::JobsManage);
    let caller = user.user_id;
    let next = req.status;

    let job = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row = load_job_for_update(conn, id)?;
            row.ensure_status_changer(caller, can_manage)?;
            row.apply_status(next, Utc::now())?;

            Ok(diesel::update(service_jobs::table.find(id))
                .set(&row)
                .returning(JobRow::as_returning())
                .get_result(conn)?)
        })
    })
    .await
    .inspect_err(|e| {
        if matches!(e, ApiError::Conflict(_)) {
            warn!("[JOB_STATUS] {} on job {id}: {e}", user.username);
        }
    })?;

    info!("Job {} moved to {} by {}", job.job_number, job.status, user.username);
    Ok(Json(job))
}

pub async fn handle_delete_job(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(Permission::JobsManage)?;

    with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let row = load_job_for_update(conn, id)?;
            let status = row.status()?;
            if !status.is_deletable() {
                return Err(ApiError::conflict(format!(
                    "Job {} is {status}; only open or cancelled jobs can be deleted",
                    row.job_number
                )));
            }
            diesel::delete(service_jobs::table.find(id))
                .execute(conn)
                .map_err(|e| ApiError::from_delete(e, "Job"))?;
            Ok(())
        })
    })
    .await?;

    info!("Job {id} deleted by {}", user.username);
    Ok(StatusCode::NO_CONTENT)
}
