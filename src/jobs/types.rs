use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::enums::Priority;
use crate::core::shared::error::ApiError;
use crate::core::shared::schema::service_jobs;
use crate::core::shared::utils::double_option;
use crate::text_enum;

pub const JOB_NUMBER_PREFIX: &str = "SJ";

text_enum! {
    pub enum JobStatus("job status") {
        Open => "open",
        InProgress => "in_progress",
        OnHold => "on_hold",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Open, InProgress | OnHold | Completed | Cancelled)
                | (InProgress, OnHold | Completed | Cancelled)
                | (OnHold, InProgress | Cancelled)
        )
    }

    /// Only jobs that never started, or were called off, may be removed.
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Open | Self::Cancelled)
    }

    pub fn check_transition(&self, next: JobStatus) -> Result<(), ApiError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(ApiError::conflict(format!(
                "Cannot move a job from {self} to {next}"
            )))
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = service_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct JobRow {
    pub id: Uuid,
    pub job_number: String,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub customer_name: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<Uuid>,
    pub scheduled_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    pub fn status(&self) -> Result<JobStatus, ApiError> {
        self.status.parse()
    }

    /// Managers may move any job; everyone else only the jobs assigned to them.
    pub fn ensure_status_changer(&self, caller: Uuid, can_manage: bool) -> Result<(), ApiError> {
        if can_manage || self.assigned_to == Some(caller) {
            Ok(())
        } else {
            Err(ApiError::forbidden(
                "Only the assignee or a job manager can change the status",
            ))
        }
    }

    /// Moves the job to `next` if the workflow allows it. Entering
    /// `Completed` stamps `completed_at`.
    pub fn apply_status(&mut self, next: JobStatus, now: DateTime<Utc>) -> Result<(), ApiError> {
        self.status()?.check_transition(next)?;
        self.status = next.as_str().to_string();
        if next == JobStatus::Completed {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct JobFilter {
    pub project_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub project_id: Option<Uuid>,
    pub description: Option<String>,
    pub customer_name: Option<String>,
    pub location: Option<String>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Uuid>,
    pub scheduled_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub customer_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Deserialize)]
pub struct JobStatusRequest {
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobStatus::*;

    #[test]
    fn test_allowed_transitions() {
        assert!(Open.can_transition_to(InProgress));
        assert!(Open.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(OnHold));
        assert!(OnHold.can_transition_to(InProgress));
        assert!(OnHold.can_transition_to(Cancelled));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!OnHold.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Open));
        assert!(!Open.can_transition_to(Open));
        for next in JobStatus::ALL {
            assert!(!Completed.can_transition_to(*next));
            assert!(!Cancelled.can_transition_to(*next));
        }
    }

    #[test]
    fn test_check_transition_is_conflict() {
        let err = Completed.check_transition(Open).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(
            err.to_string(),
            "Conflict: Cannot move a job from completed to open"
        );
    }

    #[test]
    fn test_deletable_states() {
        assert!(Open.is_deletable());
        assert!(Cancelled.is_deletable());
        assert!(!InProgress.is_deletable());
        assert!(!Completed.is_deletable());
        assert!(Completed.is_terminal());
    }

    fn job(status: JobStatus, assigned_to: Option<Uuid>) -> JobRow {
        let created = Utc::now() - chrono::Duration::days(2);
        JobRow {
            id: Uuid::new_v4(),
            job_number: "SJ-2026-0007".to_string(),
            project_id: None,
            title: "Chiller inspection".to_string(),
            description: None,
            customer_name: Some("Marina Towers".to_string()),
            location: None,
            status: status.as_str().to_string(),
            priority: "normal".to_string(),
            assigned_to,
            scheduled_date: None,
            completed_at: None,
            created_by: Uuid::new_v4(),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_completing_stamps_completed_at() {
        let mut row = job(InProgress, None);
        let now = Utc::now();
        row.apply_status(Completed, now).unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(row.completed_at, Some(now));
        assert_eq!(row.updated_at, now);
    }

    #[test]
    fn test_other_moves_leave_completed_at_empty() {
        let mut row = job(Open, None);
        row.apply_status(OnHold, Utc::now()).unwrap();
        assert_eq!(row.status, "on_hold");
        assert!(row.completed_at.is_none());
    }

    #[test]
    fn test_terminal_job_is_left_untouched() {
        let mut row = job(Cancelled, None);
        let before = row.updated_at;
        let err = row.apply_status(InProgress, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(row.status, "cancelled");
        assert_eq!(row.updated_at, before);
    }

    #[test]
    fn test_assignee_without_manage_may_change_status() {
        let assignee = Uuid::new_v4();
        let row = job(Open, Some(assignee));
        assert!(row.ensure_status_changer(assignee, false).is_ok());
        assert!(row.ensure_status_changer(Uuid::new_v4(), true).is_ok());

        let err = row.ensure_status_changer(Uuid::new_v4(), false).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert!(job(Open, None).ensure_status_changer(assignee, false).is_err());
    }

    #[test]
    fn test_status_request_rejects_unknown() {
        assert!(serde_json::from_str::<JobStatusRequest>(r#"{"status":"done"}"#).is_err());
        let req: JobStatusRequest = serde_json::from_str(r#"{"status":"on_hold"}"#).unwrap();
        assert_eq!(req.status, OnHold);
    }
}
