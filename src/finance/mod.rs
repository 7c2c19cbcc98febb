//! Payment instructions, bank account heads, collections and deposits.

pub mod account_heads;
pub mod collections;
pub mod deposits;
pub mod payments;
pub mod summary;
pub mod types;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use account_heads::*;
pub use collections::*;
pub use deposits::*;
pub use payments::*;
pub use summary::handle_finance_summary;
pub use types::*;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::PAYMENTS,
            get(handle_list_payments).post(handle_create_payment),
        )
        .route(
            ApiUrls::PAYMENT_BY_ID,
            get(handle_get_payment)
                .put(handle_update_payment)
                .delete(handle_delete_payment),
        )
        .route(ApiUrls::PAYMENT_APPROVE, post(handle_approve_payment))
        .route(ApiUrls::PAYMENT_REJECT, post(handle_reject_payment))
        .route(
            ApiUrls::ACCOUNT_HEADS,
            get(handle_list_account_heads).post(handle_create_account_head),
        )
        .route(
            ApiUrls::ACCOUNT_HEAD_BY_ID,
            get(handle_get_account_head).put(handle_update_account_head),
        )
        .route(ApiUrls::ACCOUNT_HEAD_APPROVE, post(handle_approve_account_head))
        .route(ApiUrls::ACCOUNT_HEAD_REJECT, post(handle_reject_account_head))
        .route(ApiUrls::ACCOUNT_HEAD_STATUS, put(handle_set_account_head_status))
        .route(
            ApiUrls::COLLECTIONS,
            get(handle_list_collections).post(handle_create_collection),
        )
        .route(
            ApiUrls::COLLECTION_BY_ID,
            get(handle_get_collection).delete(handle_delete_collection),
        )
        .route(
            ApiUrls::DEPOSITS,
            get(handle_list_deposits).post(handle_create_deposit),
        )
        .route(
            ApiUrls::DEPOSIT_BY_ID,
            get(handle_get_deposit).delete(handle_delete_deposit),
        )
        .route(ApiUrls::FINANCE_SUMMARY, get(handle_finance_summary))
}
