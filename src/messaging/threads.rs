use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::pg::Pg;
use diesel::prelude::*;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::apply_sort;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::query::{ListQuery, Page};
use crate::core::shared::schema::{messages, thread_participants, threads, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{like_pattern, require_text, with_conn};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::types::{
    participant_set, validate_body, AddParticipantsRequest, CreateThreadRequest, MessageRow,
    ParticipantRow, ParticipantView, ThreadDetail, ThreadRow, ThreadSummaryItem, SUBJECT_MAX,
};

const SORT_KEYS: &[&str] = &["updated_at", "created_at", "subject"];

/// Loads the thread if `user_id` takes part in it. Outsiders see 404.
pub(crate) fn load_for_participant(
    conn: &mut PgConnection,
    thread_id: Uuid,
    user_id: Uuid,
) -> ApiResult<ThreadRow> {
    threads::table
        .inner_join(thread_participants::table)
        .filter(threads::id.eq(thread_id))
        .filter(thread_participants::user_id.eq(user_id))
        .select(ThreadRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Thread"))
}

pub(crate) fn participants(
    conn: &mut PgConnection,
    thread_id: Uuid,
) -> QueryResult<Vec<ParticipantView>> {
    thread_participants::table
        .inner_join(users::table)
        .filter(thread_participants::thread_id.eq(thread_id))
        .order(users::full_name.asc())
        .select((
            users::id,
            users::username,
            users::full_name,
            thread_participants::joined_at,
            thread_participants::last_read_at,
        ))
        .load(conn)
}

fn detail(conn: &mut PgConnection, thread: ThreadRow) -> ApiResult<ThreadDetail> {
    let participants = participants(conn, thread.id)?;
    Ok(ThreadDetail {
        thread,
        participants,
    })
}

/// Rejects ids that do not name active users.
fn ensure_active_users(conn: &mut PgConnection, ids: &[Uuid]) -> ApiResult<()> {
    let found: Vec<Uuid> = users::table
        .filter(users::id.eq_any(ids))
        .filter(users::is_active.eq(true))
        .select(users::id)
        .load(conn)?;
    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !found.contains(id))
        .map(Uuid::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(format!(
            "Unknown or inactive participants: {}",
            missing.join(", ")
        )))
    }
}

/// Unread messages per thread for `user_id`, ignoring their own messages.
pub(crate) fn unread_by_thread(
    conn: &mut PgConnection,
    user_id: Uuid,
    thread_ids: &[Uuid],
) -> QueryResult<HashMap<Uuid, i64>> {
    let rows: Vec<(Uuid, i64)> = messages::table
        .inner_join(
            thread_participants::table.on(thread_participants::thread_id
                .eq(messages::thread_id)
                .and(thread_participants::user_id.eq(user_id))),
        )
        .filter(messages::thread_id.eq_any(thread_ids))
        .filter(messages::sender_id.ne(user_id))
        .filter(
            thread_participants::last_read_at
                .is_null()
                .or(messages::created_at
                    .nullable()
                    .gt(thread_participants::last_read_at)),
        )
        .group_by(messages::thread_id)
        .select((messages::thread_id, count_star()))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}

pub(crate) fn thread_ids_for(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<Uuid>> {
    thread_participants::table
        .filter(thread_participants::user_id.eq(user_id))
        .select(thread_participants::thread_id)
        .load(conn)
}

fn last_messages(
    conn: &mut PgConnection,
    thread_ids: &[Uuid],
) -> QueryResult<HashMap<Uuid, MessageRow>> {
    let rows: Vec<MessageRow> = messages::table
        .filter(messages::thread_id.eq_any(thread_ids))
        .distinct_on(messages::thread_id)
        .order((
            messages::thread_id,
            messages::created_at.desc(),
            messages::id.desc(),
        ))
        .select(MessageRow::as_select())
        .load(conn)?;
    Ok(rows.into_iter().map(|m| (m.thread_id, m)).collect())
}

/// The caller's threads, most recent activity first.
pub async fn handle_list_threads(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(q): ApiQuery<ListQuery>,
) -> ApiResult<Json<Page<ThreadSummaryItem>>> {
    user.require(Permission::MessagingUse)?;
    q.reject_status_filter()?;
    let sort = q.sort_key(SORT_KEYS)?;
    let me = user.user_id;

    let page = with_conn(&state.conn, move |conn| {
        let base = || {
            let mut query = threads::table
                .inner_join(thread_participants::table)
                .filter(thread_participants::user_id.eq(me))
                .into_boxed::<Pg>();
            if let Some(term) = q.search_term() {
                query = query.filter(threads::subject.ilike(like_pattern(term)));
            }
            query
        };

        let total: i64 = base().count().get_result(conn)?;
        let rows: Vec<ThreadRow> = apply_sort!(base(), sort, q.order(), {
            "updated_at" => threads::updated_at,
            "created_at" => threads::created_at,
            "subject" => threads::subject,
        })
        .then_order_by(threads::id.desc())
        .limit(q.limit())
            .offset(q.offset())
            .select(ThreadRow::as_select())
            .load(conn)?;

        let ids: Vec<Uuid> = rows.iter().map(|t| t.id).collect();
        let mut last = last_messages(conn, &ids)?;
        let unread = unread_by_thread(conn, me, &ids)?;

        let items = rows
            .into_iter()
            .map(|thread| ThreadSummaryItem {
                last_message: last.remove(&thread.id),
                unread_count: unread.get(&thread.id).copied().unwrap_or(0),
                thread,
            })
            .collect();
        Ok(Page::new(items, total, &q))
    })
    .await?;

    Ok(Json(page))
}

pub async fn handle_create_thread(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateThreadRequest>,
) -> ApiResult<(StatusCode, Json<ThreadDetail>)> {
    user.require(Permission::MessagingUse)?;
    let subject = require_text("subject", &req.subject, SUBJECT_MAX)?;
    let first_message = req.body.as_deref().map(validate_body).transpose()?;
    let member_ids = participant_set(user.user_id, &req.participant_ids);
    if member_ids.len() < 2 {
        return Err(ApiError::validation(
            "A thread needs at least one other participant",
        ));
    }
    let creator = user.user_id;

    let thread = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            ensure_active_users(conn, &member_ids)?;

            let now = Utc::now();
            let thread: ThreadRow = diesel::insert_into(threads::table)
                .values(&ThreadRow {
                    id: Uuid::new_v4(),
                    subject,
                    created_by: creator,
                    created_at: now,
                    updated_at: now,
                })
                .returning(ThreadRow::as_returning())
                .get_result(conn)?;

            let members: Vec<ParticipantRow> = member_ids
                .iter()
                .map(|&user_id| ParticipantRow {
                    thread_id: thread.id,
                    user_id,
                    joined_at: now,
                    last_read_at: (user_id == creator).then_some(now),
                })
                .collect();
            diesel::insert_into(thread_participants::table)
                .values(&members)
                .execute(conn)?;

            if let Some(body) = first_message {
                diesel::insert_into(messages::table)
                    .values(&MessageRow {
                        id: Uuid::new_v4(),
                        thread_id: thread.id,
                        sender_id: creator,
                        body,
                        client_ref: None,
                        created_at: now,
                    })
                    .execute(conn)?;
            }

            detail(conn, thread)
        })
    })
    .await?;

    info!(
        "Thread '{}' started by {} with {} participants",
        thread.thread.subject,
        user.username,
        thread.participants.len()
    );
    Ok((StatusCode::CREATED, Json(thread)))
}

pub async fn handle_get_thread(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ThreadDetail>> {
    user.require(Permission::MessagingUse)?;
    let me = user.user_id;
    let thread = with_conn(&state.conn, move |conn| {
        let thread = load_for_participant(conn, id, me)?;
        detail(conn, thread)
    })
    .await?;
    Ok(Json(thread))
}

pub async fn handle_mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(Permission::MessagingUse)?;
    let me = user.user_id;
    let now: DateTime<Utc> = Utc::now();

    let updated = with_conn(&state.conn, move |conn| {
        Ok(diesel::update(
            thread_participants::table
                .filter(thread_participants::thread_id.eq(id))
                .filter(thread_participants::user_id.eq(me)),
        )
        .set(thread_participants::last_read_at.eq(Some(now)))
        .execute(conn)?)
    })
    .await?;

    if updated == 0 {
        return Err(ApiError::not_found("Thread"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_add_participants(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<AddParticipantsRequest>,
) -> ApiResult<Json<ThreadDetail>> {
    user.require(Permission::MessagingUse)?;
    if req.user_ids.is_empty() {
        return Err(ApiError::validation("user_ids must not be empty"));
    }
    let me = user.user_id;

    let (thread, added) = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let thread = load_for_participant(conn, id, me)?;
            ensure_active_users(conn, &req.user_ids)?;

            let now = Utc::now();
            let rows: Vec<ParticipantRow> = req
                .user_ids
                .iter()
                .map(|&user_id| ParticipantRow {
                    thread_id: id,
                    user_id,
                    joined_at: now,
                    last_read_at: None,
                })
                .collect();
            let added = diesel::insert_into(thread_participants::table)
                .values(&rows)
                .on_conflict_do_nothing()
                .execute(conn)?;

            Ok((detail(conn, thread)?, added))
        })
    })
    .await?;

    if added > 0 {
        info!(
            "{} added {added} participant(s) to thread '{}'",
            user.username, thread.thread.subject
        );
    }
    Ok(Json(thread))
}
