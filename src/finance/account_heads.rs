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
use crate::core::shared::schema::account_heads;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    like_pattern, normalize_currency, optional_text, require_text, with_conn,
};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::types::{
    normalize_account_number, AccountHeadRow, AccountHeadStatus, AccountHeadStatusRequest,
    CreateAccountHeadRequest, RejectRequest, UpdateAccountHeadRequest,
};

const SORT_KEYS: &[&str] = &["created_at", "name", "bank_name", "currency", "status"];
const NAME_MAX: usize = 200;

fn filtered(
    q: &ListQuery,
    status: Option<AccountHeadStatus>,
) -> account_heads::BoxedQuery<'static, Pg> {
    let mut query = account_heads::table.into_boxed();
    if let Some(term) = q.search_term() {
        let pattern = like_pattern(term);
        query = query.filter(
            account_heads::name
                .ilike(pattern.clone())
                .or(account_heads::bank_name.ilike(pattern.clone()))
                .or(account_heads::account_number.ilike(pattern)),
        );
    }
    if let Some(status) = status {
        query = query.filter(account_heads::status.eq(status.as_str()));
    }
    query
}

pub(crate) fn load_account_head(conn: &mut PgConnection, id: Uuid) -> ApiResult<AccountHeadRow> {
    account_heads::table
        .find(id)
        .select(AccountHeadRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Account head"))
}

fn load_for_update(conn: &mut PgConnection, id: Uuid) -> ApiResult<AccountHeadRow> {
    account_heads::table
        .find(id)
        .select(AccountHeadRow::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Account head"))
}

fn save(conn: &mut PgConnection, row: &AccountHeadRow) -> ApiResult<AccountHeadRow> {
    Ok(diesel::update(account_heads::table.find(row.id))
        .set(row)
        .returning(AccountHeadRow::as_returning())
        .get_result(conn)?)
}

pub async fn handle_list_account_heads(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(q): ApiQuery<ListQuery>,
) -> ApiResult<Json<Page<AccountHeadRow>>> {
    user.require(Permission::FinanceView)?;
    let status = q.status_filter::<AccountHeadStatus>()?;
    let sort = q.sort_key(SORT_KEYS)?;

    let page = with_conn(&state.conn, move |conn| {
        let total: i64 = filtered(&q, status).count().get_result(conn)?;
        let items = apply_sort!(filtered(&q, status), sort, q.order(), {
            "created_at" => account_heads::created_at,
            "name" => account_heads::name,
            "bank_name" => account_heads::bank_name,
            "currency" => account_heads::currency,
            "status" => account_heads::status,
        })
        .limit(q.limit())
        .offset(q.offset())
        .select(AccountHeadRow::as_select())
        .load(conn)?;
        Ok(Page::new(items, total, &q))
    })
    .await?;

    Ok(Json(page))
}

pub async fn handle_get_account_head(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AccountHeadRow>> {
    user.require(Permission::FinanceView)?;
    let head = with_conn(&state.conn, move |conn| load_account_head(conn, id)).await?;
    Ok(Json(head))
}

pub async fn handle_create_account_head(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateAccountHeadRequest>,
) -> ApiResult<(StatusCode, Json<AccountHeadRow>)> {
    user.require(Permission::FinanceManage)?;
    let now = Utc::now();
    let row = AccountHeadRow {
        id: Uuid::new_v4(),
        name: require_text("name", &req.name, NAME_MAX)?,
        bank_name: require_text("bank_name", &req.bank_name, NAME_MAX)?,
        account_number: normalize_account_number("account_number", &req.account_number)?,
        iban: optional_text(req.iban)
            .map(|iban| normalize_account_number("iban", &iban))
            .transpose()?,
        currency: normalize_currency(&req.currency)?,
        status: AccountHeadStatus::PendingApproval.as_str().to_string(),
        requested_by: user.user_id,
        approved_by: None,
        approved_at: None,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    };

    let head = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(account_heads::table)
            .values(&row)
            .returning(AccountHeadRow::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!(
        "Account head '{}' requested by {}, awaiting approval",
        head.name, user.username
    );
    Ok((StatusCode::CREATED, Json(head)))
}

pub async fn handle_update_account_head(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateAccountHeadRequest>,
) -> ApiResult<Json<AccountHeadRow>> {
    user.require(Permission::FinanceManage)?;
    let touches_bank_details = req.touches_bank_details();
    let name = req
        .name
        .as_deref()
        .map(|n| require_text("name", n, NAME_MAX))
        .transpose()?;
    let bank_name = req
        .bank_name
        .as_deref()
        .map(|n| require_text("bank_name", n, NAME_MAX))
        .transpose()?;
    let account_number = req
        .account_number
        .as_deref()
        .map(|n| normalize_account_number("account_number", n))
        .transpose()?;
    let iban = match req.iban {
        Some(iban) => Some(
            optional_text(iban)
                .map(|v| normalize_account_number("iban", &v))
                .transpose()?,
        ),
        None => None,
    };
    let currency = req.currency.as_deref().map(normalize_currency).transpose()?;

    let head = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row = load_for_update(conn, id)?;
            if touches_bank_details && !row.status()?.bank_details_editable() {
                return Err(ApiError::conflict(format!(
                    "Bank details of '{}' are locked once it is {}",
                    row.name, row.status
                )));
            }

            if let Some(name) = name {
                row.name = name;
            }
            if let Some(bank_name) = bank_name {
                row.bank_name = bank_name;
            }
            if let Some(account_number) = account_number {
                row.account_number = account_number;
            }
            if let Some(iban) = iban {
                row.iban = iban;
            }
            if let Some(currency) = currency {
                row.currency = currency;
            }
            row.updated_at = Utc::now();
            save(conn, &row)
        })
    })
    .await?;

    Ok(Json(head))
}

fn transition(
    conn: &mut PgConnection,
    id: Uuid,
    next: AccountHeadStatus,
    apply: impl FnOnce(&mut AccountHeadRow),
) -> ApiResult<AccountHeadRow> {
    conn.transaction(|conn| {
        let mut row = load_for_update(conn, id)?;
        let current = row.status()?;
        if !current.can_transition_to(next) {
            return Err(ApiError::conflict(format!(
                "Cannot move account head '{}' from {current} to {next}",
                row.name
            )));
        }
        row.status = next.as_str().to_string();
        row.updated_at = Utc::now();
        apply(&mut row);
        save(conn, &row)
    })
}

pub async fn handle_approve_account_head(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AccountHeadRow>> {
    user.require(Permission::AccountsApprove)?;
    let approver = user.user_id;

    let head = with_conn(&state.conn, move |conn| {
        transition(conn, id, AccountHeadStatus::Active, |row| {
            row.approved_by = Some(approver);
            row.approved_at = Some(row.updated_at);
            row.rejection_reason = None;
        })
    })
    .await?;

    info!("Account head '{}' approved by {}", head.name, user.username);
    Ok(Json(head))
}

pub async fn handle_reject_account_head(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<RejectRequest>,
) -> ApiResult<Json<AccountHeadRow>> {
    user.require(Permission::AccountsApprove)?;
    let reason = require_text("reason", req.reason.as_deref().unwrap_or_default(), 1000)?;
    let approver = user.user_id;

    let head = with_conn(&state.conn, move |conn| {
        transition(conn, id, AccountHeadStatus::Rejected, |row| {
            row.approved_by = Some(approver);
            row.approved_at = Some(row.updated_at);
            row.rejection_reason = Some(reason);
        })
    })
    .await?;

    info!("Account head '{}' rejected by {}", head.name, user.username);
    Ok(Json(head))
}

/// Toggles an approved account between active and inactive.
pub async fn handle_set_account_head_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<AccountHeadStatusRequest>,
) -> ApiResult<Json<AccountHeadRow>> {
    user.require(Permission::FinanceManage)?;
    if !matches!(
        req.status,
        AccountHeadStatus::Active | AccountHeadStatus::Inactive
    ) {
        return Err(ApiError::validation(
            "Use the approve or reject endpoints for approval decisions",
        ));
    }

    let head = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let current = load_for_update(conn, id)?.status()?;
            if current == AccountHeadStatus::PendingApproval {
                return Err(ApiError::conflict(
                    "Account head is still awaiting approval",
                ));
            }
            transition(conn, id, req.status, |_| {})
        })
    })
    .await?;

    info!(
        "Account head '{}' set to {} by {}",
        head.name, head.status, user.username
    );
    Ok(Json(head))
}
