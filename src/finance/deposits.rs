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
use crate::core::shared::schema::deposits;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{like_pattern, normalize_currency, optional_text, with_conn};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::account_heads::load_account_head;
use super::types::{validate_amount, CreateDepositRequest, DepositFilter, DepositRow};

const SORT_KEYS: &[&str] = &["created_at", "deposited_on", "amount"];

/// A missing account head is a bad request body, not a missing resource.
/// Other failures pass through unchanged.
fn unknown_head_is_invalid(err: ApiError) -> ApiError {
    match err {
        ApiError::NotFound(_) => ApiError::validation("Account head does not exist"),
        other => other,
    }
}

fn filtered(q: &ListQuery, filter: &DepositFilter) -> deposits::BoxedQuery<'static, Pg> {
    let mut query = deposits::table.into_boxed();
    if let Some(term) = q.search_term() {
        let pattern = like_pattern(term);
        query = query.filter(
            deposits::reference
                .ilike(pattern.clone())
                .or(deposits::notes.ilike(pattern)),
        );
    }
    if let Some(account_head_id) = filter.account_head_id {
        query = query.filter(deposits::account_head_id.eq(account_head_id));
    }
    query
}

pub async fn handle_list_deposits(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(q): ApiQuery<ListQuery>,
    ApiQuery(filter): ApiQuery<DepositFilter>,
) -> ApiResult<Json<Page<DepositRow>>> {
    user.require(Permission::FinanceView)?;
    let sort = q.sort_key(SORT_KEYS)?;

    let page = with_conn(&state.conn, move |conn| {
        let total: i64 = filtered(&q, &filter).count().get_result(conn)?;
        let items = apply_sort!(filtered(&q, &filter), sort, q.order(), {
            "created_at" => deposits::created_at,
            "deposited_on" => deposits::deposited_on,
            "amount" => deposits::amount,
        })
        .limit(q.limit())
        .offset(q.offset())
        .select(DepositRow::as_select())
        .load(conn)?;
        Ok(Page::new(items, total, &q))
    })
    .await?;

    Ok(Json(page))
}

pub async fn handle_get_deposit(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DepositRow>> {
    user.require(Permission::FinanceView)?;
    let row = with_conn(&state.conn, move |conn| {
        deposits::table
            .find(id)
            .select(DepositRow::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Deposit"))
    })
    .await?;
    Ok(Json(row))
}

pub async fn handle_create_deposit(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateDepositRequest>,
) -> ApiResult<(StatusCode, Json<DepositRow>)> {
    user.require(Permission::FinanceManage)?;
    validate_amount(&req.amount)?;
    let row = DepositRow {
        id: Uuid::new_v4(),
        account_head_id: req.account_head_id,
        amount: req.amount,
        currency: normalize_currency(&req.currency)?,
        deposited_on: req.deposited_on,
        reference: optional_text(req.reference),
        notes: optional_text(req.notes),
        recorded_by: user.user_id,
        created_at: Utc::now(),
    };

    let deposit = with_conn(&state.conn, move |conn| {
        let head = load_account_head(conn, row.account_head_id).map_err(unknown_head_is_invalid)?;
        head.ensure_active()?;
        if head.currency != row.currency {
            return Err(ApiError::validation(format!(
                "Deposit currency {} does not match account head currency {}",
                row.currency, head.currency
            )));
        }
        Ok(diesel::insert_into(deposits::table)
            .values(&row)
            .returning(DepositRow::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!(
        "Deposit of {} {} recorded by {}",
        deposit.amount, deposit.currency, user.username
    );
    Ok((StatusCode::CREATED, Json(deposit)))
}

pub async fn handle_delete_deposit(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(Permission::FinanceManage)?;
    let deleted = with_conn(&state.conn, move |conn| {
        Ok(diesel::delete(deposits::table.find(id)).execute(conn)?)
    })
    .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Deposit"));
    }
    info!("Deposit {id} deleted by {}", user.username);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_head_becomes_validation() {
        let err = unknown_head_is_invalid(ApiError::not_found("Account head"));
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Account head does not exist"));
    }

    #[test]
    fn test_database_failure_is_not_masked() {
        let err = unknown_head_is_invalid(ApiError::Database("connection reset".to_string()));
        assert!(matches!(err, ApiError::Database(_)));
    }
}
