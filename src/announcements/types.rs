use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::error::ApiError;
use crate::core::shared::schema::announcements;
use crate::core::shared::utils::double_option;

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = announcements)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct AnnouncementRow {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub author_id: Uuid,
    pub pinned: bool,
    pub published_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnnouncementRow {
    /// Published and not yet expired at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.published_at <= now && self.expires_at.map_or(true, |exp| exp > now)
    }
}

pub fn validate_window(
    published_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), ApiError> {
    match expires_at {
        Some(expires_at) if expires_at <= published_at => Err(ApiError::validation(
            "expires_at must be after published_at",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AnnouncementQuery {
    #[serde(default)]
    pub include_expired: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub pinned: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub pinned: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn announcement(published_at: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> AnnouncementRow {
        AnnouncementRow {
            id: Uuid::new_v4(),
            title: "Site closure".into(),
            body: "The yard is closed on Friday.".into(),
            author_id: Uuid::new_v4(),
            pinned: false,
            published_at,
            expires_at,
            created_at: published_at,
            updated_at: published_at,
        }
    }

    #[test]
    fn test_active_window() {
        let now = Utc::now();
        assert!(announcement(now - Duration::hours(1), None).is_active(now));
        assert!(!announcement(now + Duration::hours(1), None).is_active(now));
        assert!(!announcement(now - Duration::days(2), Some(now - Duration::days(1))).is_active(now));
        assert!(announcement(now - Duration::days(2), Some(now + Duration::days(1))).is_active(now));
    }

    #[test]
    fn test_expiry_must_follow_publication() {
        let now = Utc::now();
        assert!(validate_window(now, None).is_ok());
        assert!(validate_window(now, Some(now + Duration::minutes(1))).is_ok());
        assert!(validate_window(now, Some(now)).is_err());
        assert!(validate_window(now, Some(now - Duration::days(1))).is_err());
    }
}
