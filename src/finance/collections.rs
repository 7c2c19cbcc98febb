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
use crate::core::shared::schema::collections;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    like_pattern, normalize_currency, optional_text, require_text, with_conn,
};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::types::{validate_amount, CollectionFilter, CollectionRow, CreateCollectionRequest};

const SORT_KEYS: &[&str] = &["created_at", "received_on", "amount", "payer"];

fn filtered(q: &ListQuery, filter: &CollectionFilter) -> collections::BoxedQuery<'static, Pg> {
    let mut query = collections::table.into_boxed();
    if let Some(term) = q.search_term() {
        let pattern = like_pattern(term);
        query = query.filter(
            collections::payer
                .ilike(pattern.clone())
                .or(collections::reference.ilike(pattern.clone()))
                .or(collections::notes.ilike(pattern)),
        );
    }
    if let Some(method) = filter.method {
        query = query.filter(collections::method.eq(method.as_str()));
    }
    if let Some(project_id) = filter.project_id {
        query = query.filter(collections::project_id.eq(project_id));
    }
    query
}

pub async fn handle_list_collections(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(q): ApiQuery<ListQuery>,
    ApiQuery(filter): ApiQuery<CollectionFilter>,
) -> ApiResult<Json<Page<CollectionRow>>> {
    user.require(Permission::FinanceView)?;
    let sort = q.sort_key(SORT_KEYS)?;

    let page = with_conn(&state.conn, move |conn| {
        let total: i64 = filtered(&q, &filter).count().get_result(conn)?;
        let items = apply_sort!(filtered(&q, &filter), sort, q.order(), {
            "created_at" => collections::created_at,
            "received_on" => collections::received_on,
            "amount" => collections::amount,
            "payer" => collections::payer,
        })
        .limit(q.limit())
        .offset(q.offset())
        .select(CollectionRow::as_select())
        .load(conn)?;
        Ok(Page::new(items, total, &q))
    })
    .await?;

    Ok(Json(page))
}

pub async fn handle_get_collection(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CollectionRow>> {
    user.require(Permission::FinanceView)?;
    let row = with_conn(&state.conn, move |conn| {
        collections::table
            .find(id)
            .select(CollectionRow::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Collection"))
    })
    .await?;
    Ok(Json(row))
}

pub async fn handle_create_collection(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateCollectionRequest>,
) -> ApiResult<(StatusCode, Json<CollectionRow>)> {
    user.require(Permission::FinanceManage)?;
    validate_amount(&req.amount)?;
    let row = CollectionRow {
        id: Uuid::new_v4(),
        reference: optional_text(req.reference),
        payer: require_text("payer", &req.payer, 200)?,
        amount: req.amount,
        currency: normalize_currency(&req.currency)?,
        received_on: req.received_on,
        method: req.method.as_str().to_string(),
        project_id: req.project_id,
        notes: optional_text(req.notes),
        recorded_by: user.user_id,
        created_at: Utc::now(),
    };

    let collection = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(collections::table)
            .values(&row)
            .returning(CollectionRow::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!(
        "Collection of {} {} from {} recorded by {}",
        collection.amount, collection.currency, collection.payer, user.username
    );
    Ok((StatusCode::CREATED, Json(collection)))
}

pub async fn handle_delete_collection(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(Permission::FinanceManage)?;
    let deleted = with_conn(&state.conn, move |conn| {
        Ok(diesel::delete(collections::table.find(id)).execute(conn)?)
    })
    .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Collection"));
    }
    info!("Collection {id} deleted by {}", user.username);
    Ok(StatusCode::NO_CONTENT)
}
