use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::error::ApiError;
use crate::core::shared::schema::{account_heads, collections, deposits, payment_instructions};
use crate::core::shared::utils::double_option;
use crate::text_enum;

pub const PAYMENT_REFERENCE_PREFIX: &str = "PI";

text_enum! {
    pub enum PaymentStatus("payment status") {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

impl PaymentStatus {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected)
        )
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

text_enum! {
    pub enum AccountHeadStatus("account head status") {
        PendingApproval => "pending_approval",
        Active => "active",
        Rejected => "rejected",
        Inactive => "inactive",
    }
}

impl AccountHeadStatus {
    pub fn can_transition_to(&self, next: AccountHeadStatus) -> bool {
        use AccountHeadStatus::*;
        matches!(
            (self, next),
            (PendingApproval, Active | Rejected) | (Active, Inactive) | (Inactive, Active)
        )
    }

    /// Bank details are frozen once an approver has looked at them.
    pub fn bank_details_editable(&self) -> bool {
        matches!(self, Self::PendingApproval)
    }
}

text_enum! {
    pub enum CollectionMethod("collection method") {
        Cash => "cash",
        Cheque => "cheque",
        BankTransfer => "bank_transfer",
        Card => "card",
    }
}

/// Positive, at most two decimals and below 10^12.
pub fn validate_amount(amount: &BigDecimal) -> Result<(), ApiError> {
    if amount <= &BigDecimal::zero() {
        return Err(ApiError::validation("amount must be greater than zero"));
    }
    if !(amount.clone() * BigDecimal::from(100)).is_integer() {
        return Err(ApiError::validation(
            "amount must have at most two decimal places",
        ));
    }
    if amount >= &BigDecimal::from(1_000_000_000_000i64) {
        return Err(ApiError::validation("amount is too large"));
    }
    Ok(())
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = payment_instructions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct PaymentRow {
    pub id: Uuid,
    pub reference: String,
    pub payee: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub due_date: NaiveDate,
    pub description: Option<String>,
    pub project_id: Option<Uuid>,
    pub account_head_id: Option<Uuid>,
    pub status: String,
    pub created_by: Uuid,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRow {
    pub fn status(&self) -> Result<PaymentStatus, ApiError> {
        self.status.parse()
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = account_heads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct AccountHeadRow {
    pub id: Uuid,
    pub name: String,
    pub bank_name: String,
    pub account_number: String,
    pub iban: Option<String>,
    pub currency: String,
    pub status: String,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountHeadRow {
    pub fn status(&self) -> Result<AccountHeadStatus, ApiError> {
        self.status.parse()
    }

    pub fn ensure_active(&self) -> Result<(), ApiError> {
        if self.status()? == AccountHeadStatus::Active {
            Ok(())
        } else {
            Err(ApiError::validation(format!(
                "Account head '{}' is {} and cannot be used",
                self.name, self.status
            )))
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = collections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CollectionRow {
    pub id: Uuid,
    pub reference: Option<String>,
    pub payer: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub received_on: NaiveDate,
    pub method: String,
    pub project_id: Option<Uuid>,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = deposits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DepositRow {
    pub id: Uuid,
    pub account_head_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub deposited_on: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentFilter {
    pub project_id: Option<Uuid>,
    pub account_head_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub payee: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub due_date: NaiveDate,
    pub description: Option<String>,
    pub project_id: Option<Uuid>,
    pub account_head_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePaymentRequest {
    pub payee: Option<String>,
    pub amount: Option<BigDecimal>,
    pub currency: Option<String>,
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub account_head_id: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountHeadRequest {
    pub name: String,
    pub bank_name: String,
    pub account_number: String,
    pub iban: Option<String>,
    pub currency: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAccountHeadRequest {
    pub name: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub iban: Option<Option<String>>,
    pub currency: Option<String>,
}

impl UpdateAccountHeadRequest {
    pub fn touches_bank_details(&self) -> bool {
        self.bank_name.is_some()
            || self.account_number.is_some()
            || self.iban.is_some()
            || self.currency.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountHeadStatusRequest {
    pub status: AccountHeadStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectionFilter {
    pub method: Option<CollectionMethod>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCollectionRequest {
    pub payer: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub received_on: NaiveDate,
    pub method: CollectionMethod,
    pub reference: Option<String>,
    pub project_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DepositFilter {
    pub account_head_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDepositRequest {
    pub account_head_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub deposited_on: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub count: i64,
    pub total: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct FinanceSummary {
    pub pending_payments: Vec<CurrencyTotal>,
    pub approved_payments: Vec<CurrencyTotal>,
    pub collections: Vec<CurrencyTotal>,
    pub deposits: Vec<CurrencyTotal>,
    pub pending_payment_count: i64,
    pub account_heads_awaiting_approval: i64,
}

/// Account numbers and IBANs are stored without spaces, upper-cased.
pub fn normalize_account_number(field: &str, raw: &str) -> Result<String, ApiError> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if compact.is_empty() || compact.len() > 34 {
        return Err(ApiError::validation(format!(
            "{field} must be 1 to 34 characters"
        )));
    }
    if !compact.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ApiError::validation(format!(
            "{field} may only contain letters, digits and '-'"
        )));
    }
    Ok(compact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_payment_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Pending));
        assert!(Pending.is_editable());
        assert!(!Approved.is_editable());
    }

    #[test]
    fn test_account_head_transitions() {
        use AccountHeadStatus::*;
        assert!(PendingApproval.can_transition_to(Active));
        assert!(PendingApproval.can_transition_to(Rejected));
        assert!(Active.can_transition_to(Inactive));
        assert!(Inactive.can_transition_to(Active));
        assert!(!PendingApproval.can_transition_to(Inactive));
        assert!(!Rejected.can_transition_to(Active));
        assert!(PendingApproval.bank_details_editable());
        assert!(!Active.bank_details_editable());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(&dec("1250.50")).is_ok());
        assert!(validate_amount(&dec("0")).is_err());
        assert!(validate_amount(&dec("-3")).is_err());
        assert!(validate_amount(&dec("10.005")).is_err());
        assert!(validate_amount(&dec("1000000000000")).is_err());
    }

    #[test]
    fn test_amount_accepts_string_and_number() {
        let req: CreateDepositRequest = serde_json::from_str(&format!(
            r#"{{"account_head_id":"{}","amount":"99.95","currency":"aed","deposited_on":"2026-03-01"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert_eq!(req.amount, dec("99.95"));
    }

    #[test]
    fn test_normalize_account_number() {
        assert_eq!(
            normalize_account_number("iban", "ae07 0331 2345 6789 0123 456").unwrap(),
            "AE070331234567890123456"
        );
        assert!(normalize_account_number("account_number", "   ").is_err());
        assert!(normalize_account_number("account_number", "12/34").is_err());
    }

    #[test]
    fn test_touches_bank_details() {
        let rename = UpdateAccountHeadRequest {
            name: Some("Operations".into()),
            ..Default::default()
        };
        assert!(!rename.touches_bank_details());
        let clear_iban: UpdateAccountHeadRequest = serde_json::from_str(r#"{"iban":null}"#).unwrap();
        assert!(clear_iban.touches_bank_details());
    }

    #[test]
    fn test_collection_method_names() {
        assert_eq!(
            "bank_transfer".parse::<CollectionMethod>().unwrap(),
            CollectionMethod::BankTransfer
        );
        assert!("crypto".parse::<CollectionMethod>().is_err());
    }
}
