use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::enums::Priority;
use crate::core::shared::error::ApiError;
use crate::core::shared::schema::tasks;
use crate::core::shared::utils::double_option;
use crate::text_enum;

text_enum! {
    #[derive(Default)]
    pub enum TaskStatus("task status") {
        #[default]
        Todo => "todo",
        InProgress => "in_progress",
        Done => "done",
    }
}

impl TaskStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Done)
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct TaskRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assignee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub created_by: Uuid,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn status(&self) -> Result<TaskStatus, ApiError> {
        self.status.parse()
    }

    pub fn is_involved(&self, user_id: Uuid) -> bool {
        self.created_by == user_id || self.assignee_id == Some(user_id)
    }

    /// Moves the task to `next`, keeping `completed_at` in step with `Done`.
    pub fn apply_status(&mut self, next: TaskStatus, now: DateTime<Utc>) {
        self.status = next.as_str().to_string();
        self.completed_at = match next {
            TaskStatus::Done => self.completed_at.or(Some(now)),
            _ => None,
        };
        self.updated_at = now;
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub mine: bool,
    pub assignee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task(created_by: Uuid, assignee_id: Option<Uuid>) -> TaskRow {
        let now = Utc::now();
        TaskRow {
            id: Uuid::new_v4(),
            title: "Replace filter".into(),
            description: None,
            status: TaskStatus::Todo.as_str().into(),
            priority: Priority::Normal.as_str().into(),
            assignee_id,
            project_id: None,
            due_date: None,
            created_by,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_done_stamps_and_reopen_clears_completed_at() {
        let mut row = task(Uuid::new_v4(), None);
        let now = Utc::now();
        row.apply_status(TaskStatus::Done, now);
        assert_eq!(row.completed_at, Some(now));

        // Saving Done again keeps the original completion time.
        row.apply_status(TaskStatus::Done, now + Duration::hours(1));
        assert_eq!(row.completed_at, Some(now));

        row.apply_status(TaskStatus::InProgress, now + Duration::hours(2));
        assert_eq!(row.completed_at, None);
        assert_eq!(row.status().unwrap(), TaskStatus::InProgress);
    }

    #[test]
    fn test_involvement() {
        let creator = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let row = task(creator, Some(assignee));
        assert!(row.is_involved(creator));
        assert!(row.is_involved(assignee));
        assert!(!row.is_involved(Uuid::new_v4()));
    }

    #[test]
    fn test_filter_mine_defaults_false() {
        let filter: TaskFilter = serde_json::from_str("{}").unwrap();
        assert!(!filter.mine);
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"assignee_id":null}"#).unwrap();
        assert_eq!(req.assignee_id, Some(None));
        assert_eq!(req.due_date, None);
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(serde_json::from_str::<TaskStatusRequest>(r#"{"status":"blocked"}"#).is_err());
        assert!("blocked".parse::<TaskStatus>().is_err());
        assert!(TaskStatus::Todo.is_open());
        assert!(!TaskStatus::Done.is_open());
    }
}
