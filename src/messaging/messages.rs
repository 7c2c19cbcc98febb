use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::schema::{messages, threads};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::threads::load_for_participant;
use super::types::{
    validate_body, validate_client_ref, MessageQuery, MessageRow, PostMessageRequest,
};

/// Messages in ascending order. With `after`, only those that follow the
/// given message; without it, the most recent page.
pub async fn handle_list_messages(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiQuery(q): ApiQuery<MessageQuery>,
) -> ApiResult<Json<Vec<MessageRow>>> {
    user.require(Permission::MessagingUse)?;
    let me = user.user_id;
    let limit = q.limit();

    let rows = with_conn(&state.conn, move |conn| {
        load_for_participant(conn, id, me)?;

        match q.after {
            Some(after) => {
                let (cursor_at, cursor_id): (DateTime<Utc>, Uuid) = messages::table
                    .filter(messages::thread_id.eq(id))
                    .filter(messages::id.eq(after))
                    .select((messages::created_at, messages::id))
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| {
                        ApiError::validation(format!("Message {after} is not in this thread"))
                    })?;

                Ok(messages::table
                    .filter(messages::thread_id.eq(id))
                    .filter(
                        messages::created_at.gt(cursor_at).or(messages::created_at
                            .eq(cursor_at)
                            .and(messages::id.gt(cursor_id))),
                    )
                    .order((messages::created_at.asc(), messages::id.asc()))
                    .limit(limit)
                    .select(MessageRow::as_select())
                    .load(conn)?)
            }
            None => {
                let mut latest: Vec<MessageRow> = messages::table
                    .filter(messages::thread_id.eq(id))
                    .order((messages::created_at.desc(), messages::id.desc()))
                    .limit(limit)
                    .select(MessageRow::as_select())
                    .load(conn)?;
                latest.reverse();
                Ok(latest)
            }
        }
    })
    .await?;

    Ok(Json(rows))
}

/// Posts a message. Replaying the same `client_ref` returns the stored
/// message with 200 instead of creating a second one.
pub async fn handle_post_message(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<MessageRow>)> {
    user.require(Permission::MessagingUse)?;
    let body = validate_body(&req.body)?;
    let client_ref = validate_client_ref(req.client_ref)?;
    let sender = user.user_id;

    let (status, message) = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            load_for_participant(conn, id, sender)?;

            let find_existing = |conn: &mut PgConnection, client_ref: &str| {
                messages::table
                    .filter(messages::thread_id.eq(id))
                    .filter(messages::sender_id.eq(sender))
                    .filter(messages::client_ref.eq(client_ref))
                    .select(MessageRow::as_select())
                    .first(conn)
                    .optional()
            };

            if let Some(client_ref) = client_ref.as_deref() {
                if let Some(existing) = find_existing(conn, client_ref)? {
                    return Ok((StatusCode::OK, existing));
                }
            }

            let row = MessageRow {
                id: Uuid::new_v4(),
                thread_id: id,
                sender_id: sender,
                body,
                client_ref,
                created_at: Utc::now(),
            };
            let inserted: Option<MessageRow> = diesel::insert_into(messages::table)
                .values(&row)
                .on_conflict_do_nothing()
                .returning(MessageRow::as_returning())
                .get_result(conn)
                .optional()?;

            let Some(message) = inserted else {
                // A concurrent retry with the same client_ref won the insert.
                let client_ref = row.client_ref.as_deref().unwrap_or_default();
                debug!("Message replay on thread {id} for client_ref {client_ref}");
                let existing = find_existing(conn, client_ref)?
                    .ok_or_else(|| ApiError::conflict("Message could not be stored"))?;
                return Ok((StatusCode::OK, existing));
            };

            diesel::update(threads::table.find(id))
                .set(threads::updated_at.eq(message.created_at))
                .execute(conn)?;
            Ok((StatusCode::CREATED, message))
        })
    })
    .await?;

    Ok((status, Json(message)))
}
