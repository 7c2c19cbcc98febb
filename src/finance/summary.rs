use axum::{extract::State, Json};
use bigdecimal::BigDecimal;
use diesel::dsl::{count_star, sum};
use diesel::prelude::*;
use std::sync::Arc;

use crate::core::shared::error::ApiResult;
use crate::core::shared::schema::{account_heads, collections, deposits, payment_instructions};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::types::{AccountHeadStatus, CurrencyTotal, FinanceSummary, PaymentStatus};

type GroupedTotal = (String, i64, Option<BigDecimal>);

/// Sorted by currency so the landing page renders in a stable order.
pub(crate) fn currency_totals(rows: Vec<GroupedTotal>) -> Vec<CurrencyTotal> {
    let mut totals: Vec<CurrencyTotal> = rows
        .into_iter()
        .map(|(currency, count, total)| CurrencyTotal {
            currency,
            count,
            total: total.unwrap_or_default().with_scale(2),
        })
        .collect();
    totals.sort_by(|a, b| a.currency.cmp(&b.currency));
    totals
}

fn payment_totals(conn: &mut PgConnection, status: PaymentStatus) -> ApiResult<Vec<CurrencyTotal>> {
    let rows: Vec<GroupedTotal> = payment_instructions::table
        .filter(payment_instructions::status.eq(status.as_str()))
        .group_by(payment_instructions::currency)
        .select((
            payment_instructions::currency,
            count_star(),
            sum(payment_instructions::amount),
        ))
        .load(conn)?;
    Ok(currency_totals(rows))
}

pub(crate) fn pending_payment_count(conn: &mut PgConnection) -> ApiResult<i64> {
    Ok(payment_instructions::table
        .filter(payment_instructions::status.eq(PaymentStatus::Pending.as_str()))
        .count()
        .get_result(conn)?)
}

pub(crate) fn account_heads_awaiting_approval(conn: &mut PgConnection) -> ApiResult<i64> {
    Ok(account_heads::table
        .filter(account_heads::status.eq(AccountHeadStatus::PendingApproval.as_str()))
        .count()
        .get_result(conn)?)
}

pub async fn handle_finance_summary(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> ApiResult<Json<FinanceSummary>> {
    user.require(Permission::FinanceView)?;

    let summary = with_conn(&state.conn, |conn| {
        let collection_rows: Vec<GroupedTotal> = collections::table
            .group_by(collections::currency)
            .select((collections::currency, count_star(), sum(collections::amount)))
            .load(conn)?;
        let deposit_rows: Vec<GroupedTotal> = deposits::table
            .group_by(deposits::currency)
            .select((deposits::currency, count_star(), sum(deposits::amount)))
            .load(conn)?;

        Ok(FinanceSummary {
            pending_payments: payment_totals(conn, PaymentStatus::Pending)?,
            approved_payments: payment_totals(conn, PaymentStatus::Approved)?,
            collections: currency_totals(collection_rows),
            deposits: currency_totals(deposit_rows),
            pending_payment_count: pending_payment_count(conn)?,
            account_heads_awaiting_approval: account_heads_awaiting_approval(conn)?,
        })
    })
    .await?;

    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn totals_are_sorted_and_scaled() {
        let rows = vec![
            ("USD".to_string(), 2, Some(BigDecimal::from_str("150.5").unwrap())),
            ("AED".to_string(), 1, Some(BigDecimal::from(40))),
        ];
        let totals = currency_totals(rows);
        assert_eq!(totals[0].currency, "AED");
        assert_eq!(totals[0].total.to_string(), "40.00");
        assert_eq!(totals[1].count, 2);
        assert_eq!(totals[1].total.to_string(), "150.50");
    }

    #[test]
    fn missing_sum_becomes_zero() {
        let totals = currency_totals(vec![("EUR".to_string(), 0, None)]);
        assert_eq!(totals[0].total.to_string(), "0.00");
    }
}
