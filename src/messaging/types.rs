use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::error::ApiError;
use crate::core::shared::schema::{messages, thread_participants, threads};

pub const BODY_MAX: usize = 4000;
pub const CLIENT_REF_MAX: usize = 64;
pub const SUBJECT_MAX: usize = 200;
pub const DEFAULT_MESSAGE_PAGE: i64 = 100;
pub const MAX_MESSAGE_PAGE: i64 = 200;

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = threads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ThreadRow {
    pub id: Uuid,
    pub subject: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = thread_participants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ParticipantRow {
    pub thread_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MessageRow {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub client_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A participant joined with the user's display fields.
#[derive(Debug, Clone, Queryable, Serialize)]
pub struct ParticipantView {
    pub user_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ThreadSummaryItem {
    #[serde(flatten)]
    pub thread: ThreadRow,
    pub last_message: Option<MessageRow>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: ThreadRow,
    pub participants: Vec<ParticipantView>,
}

#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    pub subject: String,
    #[serde(default)]
    pub participant_ids: Vec<Uuid>,
    pub body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub after: Option<Uuid>,
    pub limit: Option<i64>,
}

impl MessageQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_MESSAGE_PAGE)
            .clamp(1, MAX_MESSAGE_PAGE)
    }
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
    pub client_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantsRequest {
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
    pub message_count: usize,
}

/// Message bodies keep their inner whitespace but may not be blank.
pub fn validate_body(body: &str) -> Result<String, ApiError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Message body is required"));
    }
    if trimmed.chars().count() > BODY_MAX {
        return Err(ApiError::validation(format!(
            "Message body must be at most {BODY_MAX} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_client_ref(client_ref: Option<String>) -> Result<Option<String>, ApiError> {
    match client_ref.map(|r| r.trim().to_string()) {
        Some(r) if r.is_empty() => Ok(None),
        Some(r) if r.chars().count() > CLIENT_REF_MAX => Err(ApiError::validation(format!(
            "client_ref must be at most {CLIENT_REF_MAX} characters"
        ))),
        other => Ok(other),
    }
}

/// Participant list with the creator first and duplicates removed.
pub fn participant_set(creator: Uuid, requested: &[Uuid]) -> Vec<Uuid> {
    let mut ids = vec![creator];
    for id in requested {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limits() {
        assert!(validate_body("   ").is_err());
        assert_eq!(validate_body("  on my way \n").unwrap(), "on my way");
        assert!(validate_body(&"x".repeat(BODY_MAX)).is_ok());
        assert!(validate_body(&"x".repeat(BODY_MAX + 1)).is_err());
    }

    #[test]
    fn test_client_ref() {
        assert_eq!(validate_client_ref(None).unwrap(), None);
        assert_eq!(validate_client_ref(Some("  ".into())).unwrap(), None);
        assert_eq!(
            validate_client_ref(Some("tmp-17".into())).unwrap(),
            Some("tmp-17".to_string())
        );
        assert!(validate_client_ref(Some("r".repeat(CLIENT_REF_MAX + 1))).is_err());
    }

    #[test]
    fn test_participant_set_includes_creator_once() {
        let creator = Uuid::new_v4();
        let other = Uuid::new_v4();
        let ids = participant_set(creator, &[other, creator, other]);
        assert_eq!(ids, vec![creator, other]);
    }

    #[test]
    fn test_message_page_clamped() {
        assert_eq!(MessageQuery::default().limit(), DEFAULT_MESSAGE_PAGE);
        let q = MessageQuery {
            after: None,
            limit: Some(5000),
        };
        assert_eq!(q.limit(), MAX_MESSAGE_PAGE);
    }
}
