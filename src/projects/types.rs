use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::error::ApiError;
use crate::core::shared::schema::projects;
use crate::core::shared::utils::double_option;
use crate::text_enum;

text_enum! {
    #[derive(Default)]
    pub enum ProjectStatus("project status") {
        #[default]
        Active => "active",
        OnHold => "on_hold",
        Closed => "closed",
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = projects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct ProjectRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub client_name: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub manager_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub code: String,
    pub name: String,
    pub client_name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub manager_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub client_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub manager_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<NaiveDate>>,
}

/// Upper-cases a project code: 2 to 20 of `A-Z 0-9 -`.
pub fn normalize_code(raw: &str) -> Result<String, ApiError> {
    let code = raw.trim().to_ascii_uppercase();
    let len = code.len();
    if !(2..=20).contains(&len) || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ApiError::validation(
            "Project code must be 2 to 20 letters, digits or '-'",
        ));
    }
    Ok(code)
}

pub fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), ApiError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ApiError::validation(
            "end_date must not be before start_date",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" dxb-tower ").unwrap(), "DXB-TOWER");
        assert!(normalize_code("X").is_err());
        assert!(normalize_code("DXB TOWER").is_err());
    }

    #[test]
    fn test_validate_dates() {
        assert!(validate_dates(Some(date("2026-01-01")), Some(date("2026-01-01"))).is_ok());
        assert!(validate_dates(Some(date("2026-02-01")), Some(date("2026-01-01"))).is_err());
        assert!(validate_dates(None, Some(date("2026-01-01"))).is_ok());
    }

    #[test]
    fn test_status_names() {
        assert_eq!("on_hold".parse::<ProjectStatus>().unwrap(), ProjectStatus::OnHold);
        assert_eq!(ProjectStatus::default().as_str(), "active");
    }

    #[test]
    fn test_update_can_clear_manager() {
        let req: UpdateProjectRequest = serde_json::from_str(r#"{"manager_id": null}"#).unwrap();
        assert_eq!(req.manager_id, Some(None));
        assert!(req.name.is_none());
    }
}
