use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::apply_sort;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::query::{ListQuery, Page};
use crate::core::shared::schema::announcements;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{like_pattern, require_text, with_conn};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::types::{
    validate_window, AnnouncementQuery, AnnouncementRow, CreateAnnouncementRequest,
    UpdateAnnouncementRequest,
};

const SORT_KEYS: &[&str] = &["published_at", "created_at", "title"];
const TITLE_MAX: usize = 200;
const BODY_MAX: usize = 10_000;

fn filtered(
    q: &ListQuery,
    include_expired: bool,
    now: DateTime<Utc>,
) -> announcements::BoxedQuery<'static, Pg> {
    let mut query = announcements::table.into_boxed();
    if !include_expired {
        query = query.filter(announcements::published_at.le(now)).filter(
            announcements::expires_at
                .is_null()
                .or(announcements::expires_at.gt(now)),
        );
    }
    if let Some(term) = q.search_term() {
        let pattern = like_pattern(term);
        query = query.filter(
            announcements::title
                .ilike(pattern.clone())
                .or(announcements::body.ilike(pattern)),
        );
    }
    query
}

/// Counts announcements currently visible to everyone.
pub(crate) fn count_active(conn: &mut PgConnection, now: DateTime<Utc>) -> ApiResult<i64> {
    Ok(filtered(&ListQuery::default(), false, now)
        .count()
        .get_result(conn)?)
}

fn load_announcement(conn: &mut PgConnection, id: Uuid) -> ApiResult<AnnouncementRow> {
    announcements::table
        .find(id)
        .select(AnnouncementRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Announcement"))
}

/// Pinned first, then by the requested key (newest published by default).
pub async fn handle_list_announcements(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(q): ApiQuery<ListQuery>,
    ApiQuery(params): ApiQuery<AnnouncementQuery>,
) -> ApiResult<Json<Page<AnnouncementRow>>> {
    if params.include_expired {
        user.require(Permission::AnnouncementsPost)?;
    }
    q.reject_status_filter()?;
    let sort = q.sort_key(SORT_KEYS)?;
    let now = Utc::now();

    let page = with_conn(&state.conn, move |conn| {
        let total: i64 = filtered(&q, params.include_expired, now)
            .count()
            .get_result(conn)?;
        let pinned_first =
            filtered(&q, params.include_expired, now).order(announcements::pinned.desc());
        let items = apply_sort!(then pinned_first, sort, q.order(), {
            "published_at" => announcements::published_at,
            "created_at" => announcements::created_at,
            "title" => announcements::title,
        })
        .then_order_by(announcements::id.desc())
        .limit(q.limit())
        .offset(q.offset())
        .select(AnnouncementRow::as_select())
        .load(conn)?;
        Ok(Page::new(items, total, &q))
    })
    .await?;

    Ok(Json(page))
}

pub async fn handle_get_announcement(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AnnouncementRow>> {
    let can_post = user.has(Permission::AnnouncementsPost);
    let row = with_conn(&state.conn, move |conn| load_announcement(conn, id)).await?;
    if !can_post && !row.is_active(Utc::now()) {
        return Err(ApiError::not_found("Announcement"));
    }
    Ok(Json(row))
}

pub async fn handle_create_announcement(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateAnnouncementRequest>,
) -> ApiResult<(StatusCode, Json<AnnouncementRow>)> {
    user.require(Permission::AnnouncementsPost)?;
    let now = Utc::now();
    let published_at = req.published_at.unwrap_or(now);
    validate_window(published_at, req.expires_at)?;

    let row = AnnouncementRow {
        id: Uuid::new_v4(),
        title: require_text("title", &req.title, TITLE_MAX)?,
        body: require_text("body", &req.body, BODY_MAX)?,
        author_id: user.user_id,
        pinned: req.pinned,
        published_at,
        expires_at: req.expires_at,
        created_at: now,
        updated_at: now,
    };

    let announcement = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(announcements::table)
            .values(&row)
            .returning(AnnouncementRow::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Announcement '{}' posted by {}", announcement.title, user.username);
    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn handle_update_announcement(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateAnnouncementRequest>,
) -> ApiResult<Json<AnnouncementRow>> {
    user.require(Permission::AnnouncementsPost)?;
    let title = req
        .title
        .as_deref()
        .map(|t| require_text("title", t, TITLE_MAX))
        .transpose()?;
    let body = req
        .body
        .as_deref()
        .map(|b| require_text("body", b, BODY_MAX))
        .transpose()?;

    let announcement = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row = load_announcement(conn, id)?;
            if let Some(title) = title {
                row.title = title;
            }
            if let Some(body) = body {
                row.body = body;
            }
            if let Some(pinned) = req.pinned {
                row.pinned = pinned;
            }
            if let Some(published_at) = req.published_at {
                row.published_at = published_at;
            }
            if let Some(expires_at) = req.expires_at {
                row.expires_at = expires_at;
            }
            validate_window(row.published_at, row.expires_at)?;
            row.updated_at = Utc::now();

            Ok(diesel::update(announcements::table.find(id))
                .set(&row)
                .returning(AnnouncementRow::as_returning())
                .get_result(conn)?)
        })
    })
    .await?;

    Ok(Json(announcement))
}

pub async fn handle_delete_announcement(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(Permission::AnnouncementsPost)?;
    let deleted = with_conn(&state.conn, move |conn| {
        Ok(diesel::delete(announcements::table.find(id)).execute(conn)?)
    })
    .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Announcement"));
    }
    info!("Announcement {id} deleted by {}", user.username);
    Ok(StatusCode::NO_CONTENT)
}
