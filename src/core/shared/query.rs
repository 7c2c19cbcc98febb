//! Paging, sorting and filtering parameters shared by list endpoints.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::shared::error::ApiError;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn order(&self) -> SortOrder {
        self.order.unwrap_or_default()
    }

    /// Non-blank search term.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the requested sort key if it is in `allowed`, or the first
    /// allowed key when none was requested.
    pub fn sort_key<'a>(&self, allowed: &[&'a str]) -> Result<&'a str, ApiError> {
        match self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(allowed.first().copied().unwrap_or("created_at")),
            Some(requested) => allowed
                .iter()
                .copied()
                .find(|key| *key == requested)
                .ok_or_else(|| {
                    ApiError::validation(format!(
                        "Cannot sort by '{requested}'. Allowed: {}",
                        allowed.join(", ")
                    ))
                }),
        }
    }

    /// For lists without a status enum: any non-blank `status` is an error.
    pub fn reject_status_filter(&self) -> Result<(), ApiError> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(()),
            Some(status) => Err(ApiError::validation(format!(
                "This list cannot be filtered by status '{status}'"
            ))),
        }
    }

    /// Parses the `status` filter into the endpoint's status enum.
    pub fn status_filter<S>(&self) -> Result<Option<S>, ApiError>
    where
        S: FromStr<Err = ApiError>,
    {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(S::from_str)
            .transpose()
    }
}

/// A page of results with the total row count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, query: &ListQuery) -> Self {
        Self {
            items,
            total,
            limit: query.limit(),
            offset: query.offset(),
        }
    }
}

/// Applies a whitelisted sort key to a boxed diesel query.
///
/// ```ignore
/// let q = apply_sort!(q, key, order, {
///     "created_at" => projects::created_at,
///     "name" => projects::name,
/// });
/// ```
///
/// `apply_sort!(then q, ...)` appends the key after an existing ordering.
#[macro_export]
macro_rules! apply_sort {
    (then $query:expr, $key:expr, $order:expr, { $($name:literal => $column:expr),+ $(,)? }) => {{
        let query = $query;
        match ($key, $order) {
            $(
                ($name, $crate::core::shared::query::SortOrder::Asc) => query.then_order_by($column.asc()),
                ($name, $crate::core::shared::query::SortOrder::Desc) => query.then_order_by($column.desc()),
            )+
            _ => query,
        }
    }};
    ($query:expr, $key:expr, $order:expr, { $($name:literal => $column:expr),+ $(,)? }) => {{
        let query = $query;
        match ($key, $order) {
            $(
                ($name, $crate::core::shared::query::SortOrder::Asc) => query.order($column.asc()),
                ($name, $crate::core::shared::query::SortOrder::Desc) => query.order($column.desc()),
            )+
            _ => query,
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskStatus;

    #[test]
    fn test_limit_is_clamped() {
        let mut q = ListQuery::default();
        assert_eq!(q.limit(), DEFAULT_PAGE_SIZE);
        q.limit = Some(0);
        assert_eq!(q.limit(), 1);
        q.limit = Some(10_000);
        assert_eq!(q.limit(), MAX_PAGE_SIZE);
        q.offset = Some(-5);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn test_sort_key_whitelist() {
        let allowed = ["created_at", "title"];
        let mut q = ListQuery::default();
        assert_eq!(q.sort_key(&allowed).unwrap(), "created_at");

        q.sort = Some("title".into());
        assert_eq!(q.sort_key(&allowed).unwrap(), "title");

        q.sort = Some("password_hash".into());
        assert!(q.sort_key(&allowed).is_err());
    }

    #[test]
    fn test_reject_status_filter() {
        let mut q = ListQuery::default();
        assert!(q.reject_status_filter().is_ok());
        q.status = Some("  ".into());
        assert!(q.reject_status_filter().is_ok());
        q.status = Some("open".into());
        let err = q.reject_status_filter().unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m.contains("'open'")));
    }

    #[test]
    fn test_search_term_ignores_blank() {
        let mut q = ListQuery::default();
        q.search = Some("   ".into());
        assert_eq!(q.search_term(), None);
        q.search = Some(" pump ".into());
        assert_eq!(q.search_term(), Some("pump"));
    }

    #[test]
    fn test_status_filter_parses_enum() {
        let mut q = ListQuery::default();
        assert_eq!(q.status_filter::<TaskStatus>().unwrap(), None);

        q.status = Some("in_progress".into());
        assert_eq!(
            q.status_filter::<TaskStatus>().unwrap(),
            Some(TaskStatus::InProgress)
        );

        q.status = Some("archived".into());
        assert!(q.status_filter::<TaskStatus>().is_err());
    }

    #[test]
    fn test_order_defaults_to_desc() {
        let q: ListQuery = serde_json::from_str(r#"{"order":"asc"}"#).unwrap();
        assert_eq!(q.order(), SortOrder::Asc);
        assert_eq!(ListQuery::default().order(), SortOrder::Desc);
    }
}
