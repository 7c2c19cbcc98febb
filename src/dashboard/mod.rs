//! Landing page counters. Sections the caller cannot see are omitted.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;

use crate::announcements::handlers::count_active;
use crate::core::shared::error::ApiResult;
use crate::core::shared::schema::{service_jobs, tasks};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::core::urls::ApiUrls;
use crate::finance::summary::{account_heads_awaiting_approval, pending_payment_count};
use crate::jobs::JobStatus;
use crate::messaging::threads::{thread_ids_for, unread_by_thread};
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;
use crate::tasks::TaskStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct FinanceCounters {
    pub pending_payments: i64,
    pub account_heads_awaiting_approval: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub my_open_tasks: i64,
    pub my_overdue_tasks: i64,
    pub unread_threads: i64,
    pub active_announcements: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_jobs: Option<Vec<StatusCount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finance: Option<FinanceCounters>,
}

/// Orders job counts by workflow position and drops terminal states.
fn open_job_counts(rows: Vec<(String, i64)>) -> Vec<StatusCount> {
    JobStatus::ALL
        .iter()
        .filter(|s| !s.is_terminal())
        .map(|status| StatusCount {
            status: status.as_str().to_string(),
            count: rows
                .iter()
                .find(|(s, _)| s == status.as_str())
                .map_or(0, |(_, c)| *c),
        })
        .collect()
}

pub async fn handle_dashboard_summary(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> ApiResult<Json<DashboardSummary>> {
    let me = user.user_id;
    let sees_jobs = user.has(Permission::JobsView);
    let sees_finance = user.has(Permission::FinanceView);
    let uses_messaging = user.has(Permission::MessagingUse);

    let summary = with_conn(&state.conn, move |conn| {
        let now = Utc::now();
        let today = now.date_naive();

        let mine = || {
            tasks::table
                .filter(tasks::created_by.eq(me).or(tasks::assignee_id.eq(me)))
                .filter(tasks::status.ne(TaskStatus::Done.as_str()))
                .into_boxed::<diesel::pg::Pg>()
        };
        let my_open_tasks: i64 = mine().count().get_result(conn)?;
        let my_overdue_tasks: i64 = mine()
            .filter(tasks::due_date.lt(today))
            .count()
            .get_result(conn)?;

        let unread_threads = if uses_messaging {
            let ids = thread_ids_for(conn, me)?;
            unread_by_thread(conn, me, &ids)?
                .values()
                .filter(|&&n| n > 0)
                .count() as i64
        } else {
            0
        };

        let open_jobs = if sees_jobs {
            let rows: Vec<(String, i64)> = service_jobs::table
                .group_by(service_jobs::status)
                .select((service_jobs::status, count_star()))
                .load(conn)?;
            Some(open_job_counts(rows))
        } else {
            None
        };

        let finance = if sees_finance {
            Some(FinanceCounters {
                pending_payments: pending_payment_count(conn)?,
                account_heads_awaiting_approval: account_heads_awaiting_approval(conn)?,
            })
        } else {
            None
        };

        Ok(DashboardSummary {
            my_open_tasks,
            my_overdue_tasks,
            unread_threads,
            active_announcements: count_active(conn, now)?,
            open_jobs,
            finance,
        })
    })
    .await?;

    Ok(Json(summary))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new().route(ApiUrls::DASHBOARD_SUMMARY, get(handle_dashboard_summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_job_counts_skip_terminal_and_fill_zero() {
        let rows = vec![
            ("open".to_string(), 4),
            ("completed".to_string(), 12),
            ("on_hold".to_string(), 1),
        ];
        let counts = open_job_counts(rows);
        assert_eq!(
            counts,
            vec![
                StatusCount { status: "open".into(), count: 4 },
                StatusCount { status: "in_progress".into(), count: 0 },
                StatusCount { status: "on_hold".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_hidden_sections_are_not_serialized() {
        let summary = DashboardSummary {
            my_open_tasks: 3,
            my_overdue_tasks: 1,
            unread_threads: 2,
            active_announcements: 0,
            open_jobs: None,
            finance: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("open_jobs").is_none());
        assert!(json.get("finance").is_none());
        assert_eq!(json["unread_threads"], 2);
    }
}
