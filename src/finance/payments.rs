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
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::query::{ListQuery, Page};
use crate::core::shared::schema::payment_instructions;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    like_pattern, next_sequence, normalize_currency, optional_text, require_text,
    sequence_reference, with_conn, with_sequence_retry,
};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::account_heads::load_account_head;
use super::types::{
    validate_amount, CreatePaymentRequest, PaymentFilter, PaymentRow, PaymentStatus,
    RejectRequest, UpdatePaymentRequest, PAYMENT_REFERENCE_PREFIX,
};

const SORT_KEYS: &[&str] = &["created_at", "due_date", "amount", "reference", "payee", "status"];
const PAYEE_MAX: usize = 200;
const REASON_MAX: usize = 1000;

fn filtered(
    q: &ListQuery,
    filter: &PaymentFilter,
    status: Option<PaymentStatus>,
) -> payment_instructions::BoxedQuery<'static, Pg> {
    let mut query = payment_instructions::table.into_boxed();
    if let Some(term) = q.search_term() {
        let pattern = like_pattern(term);
        query = query.filter(
            payment_instructions::reference
                .ilike(pattern.clone())
                .or(payment_instructions::payee.ilike(pattern.clone()))
                .or(payment_instructions::description.ilike(pattern)),
        );
    }
    if let Some(status) = status {
        query = query.filter(payment_instructions::status.eq(status.as_str()));
    }
    if let Some(project_id) = filter.project_id {
        query = query.filter(payment_instructions::project_id.eq(project_id));
    }
    if let Some(account_head_id) = filter.account_head_id {
        query = query.filter(payment_instructions::account_head_id.eq(account_head_id));
    }
    query
}

fn load_payment(conn: &mut PgConnection, id: Uuid) -> ApiResult<PaymentRow> {
    payment_instructions::table
        .find(id)
        .select(PaymentRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Payment instruction"))
}

fn load_pending_for_update(conn: &mut PgConnection, id: Uuid) -> ApiResult<PaymentRow> {
    let row: PaymentRow = payment_instructions::table
        .find(id)
        .select(PaymentRow::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Payment instruction"))?;
    if !row.status()?.is_editable() {
        return Err(ApiError::conflict(format!(
            "Payment {} is already {}",
            row.reference, row.status
        )));
    }
    Ok(row)
}

fn ensure_usable_account_head(conn: &mut PgConnection, id: Option<Uuid>) -> ApiResult<()> {
    match id {
        Some(id) => load_account_head(conn, id)?.ensure_active(),
        None => Ok(()),
    }
}

fn next_reference(conn: &mut PgConnection, year: i32) -> ApiResult<String> {
    let prefix = format!("{PAYMENT_REFERENCE_PREFIX}-{year}-");
    let existing: Vec<String> = payment_instructions::table
        .filter(payment_instructions::reference.like(format!("{prefix}%")))
        .select(payment_instructions::reference)
        .load(conn)?;
    Ok(sequence_reference(
        PAYMENT_REFERENCE_PREFIX,
        year,
        next_sequence(&prefix, &existing),
    ))
}

pub async fn handle_list_payments(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(q): ApiQuery<ListQuery>,
    ApiQuery(filter): ApiQuery<PaymentFilter>,
) -> ApiResult<Json<Page<PaymentRow>>> {
    user.require(Permission::FinanceView)?;
    let status = q.status_filter::<PaymentStatus>()?;
    let sort = q.sort_key(SORT_KEYS)?;

    let page = with_conn(&state.conn, move |conn| {
        let total: i64 = filtered(&q, &filter, status).count().get_result(conn)?;
        let items = apply_sort!(filtered(&q, &filter, status), sort, q.order(), {
            "created_at" => payment_instructions::created_at,
            "due_date" => payment_instructions::due_date,
            "amount" => payment_instructions::amount,
            "reference" => payment_instructions::reference,
            "payee" => payment_instructions::payee,
            "status" => payment_instructions::status,
        })
        .limit(q.limit())
        .offset(q.offset())
        .select(PaymentRow::as_select())
        .load(conn)?;
        Ok(Page::new(items, total, &q))
    })
    .await?;

    Ok(Json(page))
}

pub async fn handle_get_payment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PaymentRow>> {
    user.require(Permission::FinanceView)?;
    let payment = with_conn(&state.conn, move |conn| load_payment(conn, id)).await?;
    Ok(Json(payment))
}

pub async fn handle_create_payment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<PaymentRow>)> {
    user.require(Permission::FinanceManage)?;
    let payee = require_text("payee", &req.payee, PAYEE_MAX)?;
    validate_amount(&req.amount)?;
    let currency = normalize_currency(&req.currency)?;

    let now = Utc::now();
    let mut row = PaymentRow {
        id: Uuid::new_v4(),
        reference: String::new(),
        payee,
        amount: req.amount,
        currency,
        due_date: req.due_date,
        description: optional_text(req.description),
        project_id: req.project_id,
        account_head_id: req.account_head_id,
        status: PaymentStatus::Pending.as_str().to_string(),
        created_by: user.user_id,
        decided_by: None,
        decided_at: None,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    };

    let payment = with_conn(&state.conn, move |conn| {
        ensure_usable_account_head(conn, row.account_head_id)?;
        with_sequence_retry(|| {
            conn.transaction(|conn| {
                row.reference = next_reference(conn, now.year())?;
                Ok(diesel::insert_into(payment_instructions::table)
                    .values(&row)
                    .returning(PaymentRow::as_returning())
                    .get_result(conn)?)
            })
        })
    })
    .await?;

    info!(
        "Payment {} for {} {} created by {}",
        payment.reference, payment.amount, payment.currency, user.username
    );
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn handle_update_payment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdatePaymentRequest>,
) -> ApiResult<Json<PaymentRow>> {
    user.require(Permission::FinanceManage)?;
    let payee = req
        .payee
        .as_deref()
        .map(|p| require_text("payee", p, PAYEE_MAX))
        .transpose()?;
    if let Some(amount) = &req.amount {
        validate_amount(amount)?;
    }
    let currency = req.currency.as_deref().map(normalize_currency).transpose()?;

    let payment = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row = load_pending_for_update(conn, id)?;

            if let Some(payee) = payee {
                row.payee = payee;
            }
            if let Some(amount) = req.amount {
                row.amount = amount;
            }
            if let Some(currency) = currency {
                row.currency = currency;
            }
            if let Some(due_date) = req.due_date {
                row.due_date = due_date;
            }
            if let Some(description) = req.description {
                row.description = optional_text(description);
            }
            if let Some(project_id) = req.project_id {
                row.project_id = project_id;
            }
            if let Some(account_head_id) = req.account_head_id {
                ensure_usable_account_head(conn, account_head_id)?;
                row.account_head_id = account_head_id;
            }
            row.updated_at = Utc::now();

            Ok(diesel::update(payment_instructions::table.find(id))
                .set(&row)
                .returning(PaymentRow::as_returning())
                .get_result(conn)?)
        })
    })
    .await?;

    Ok(Json(payment))
}

pub async fn handle_delete_payment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(Permission::FinanceManage)?;

    let reference = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let row = load_pending_for_update(conn, id)?;
            diesel::delete(payment_instructions::table.find(id)).execute(conn)?;
            Ok(row.reference)
        })
    })
    .await?;

    info!("Payment {reference} deleted by {}", user.username);
    Ok(StatusCode::NO_CONTENT)
}

/// Moves a pending instruction to `next`, recording who decided.
async fn decide(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
    next: PaymentStatus,
    reason: Option<String>,
) -> ApiResult<PaymentRow> {
    user.require(Permission::PaymentsApprove)?;
    let decided_by = user.user_id;

    with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let mut row = load_pending_for_update(conn, id)?;
            let current = row.status()?;
            if !current.can_transition_to(next) {
                return Err(ApiError::conflict(format!(
                    "Cannot move payment {} from {current} to {next}",
                    row.reference
                )));
            }
            if next == PaymentStatus::Approved {
                ensure_usable_account_head(conn, row.account_head_id)?;
            }

            let now = Utc::now();
            row.status = next.as_str().to_string();
            row.decided_by = Some(decided_by);
            row.decided_at = Some(now);
            row.rejection_reason = reason;
            row.updated_at = now;

            Ok(diesel::update(payment_instructions::table.find(id))
                .set(&row)
                .returning(PaymentRow::as_returning())
                .get_result(conn)?)
        })
    })
    .await
}

pub async fn handle_approve_payment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PaymentRow>> {
    let payment = decide(&state, &user, id, PaymentStatus::Approved, None)
        .await
        .inspect_err(|e| warn!("[PAYMENT_APPROVE] {id}: {e}"))?;
    info!("Payment {} approved by {}", payment.reference, user.username);
    Ok(Json(payment))
}

pub async fn handle_reject_payment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<RejectRequest>,
) -> ApiResult<Json<PaymentRow>> {
    user.require(Permission::PaymentsApprove)?;
    let reason = require_text("reason", req.reason.as_deref().unwrap_or_default(), REASON_MAX)?;

    let payment = decide(&state, &user, id, PaymentStatus::Rejected, Some(reason))
        .await
        .inspect_err(|e| warn!("[PAYMENT_REJECT] {id}: {e}"))?;
    info!("Payment {} rejected by {}", payment.reference, user.username);
    Ok(Json(payment))
}
