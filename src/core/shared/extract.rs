//! Extractors whose rejections use the API error body.

use axum::extract::{FromRequest, FromRequestParts};

use crate::core::shared::error::ApiError;

/// `axum::Json` with malformed bodies reported as 400 `{"error": ...}`.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with the same error body.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
