use axum::{
    extract::{Path, State},
    Json,
};
use diesel::prelude::*;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{messages, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::llm::LLMProvider;
use crate::security::auth::AuthenticatedUser;
use crate::security::permissions::Permission;

use super::prompt::{
    build_summary_prompt, build_transcript, summary_config, TranscriptLine,
    MAX_SUMMARY_MESSAGES, MAX_TRANSCRIPT_CHARS,
};
use super::threads::load_for_participant;
use super::types::SummaryResponse;

/// Sends the transcript to the provider. Returns the summary and the number
/// of messages it was built from.
pub async fn summarize(
    provider: &dyn LLMProvider,
    subject: &str,
    lines: &[TranscriptLine],
    max_tokens: u32,
) -> ApiResult<SummaryResponse> {
    let (transcript, message_count) = build_transcript(lines, MAX_TRANSCRIPT_CHARS);
    if message_count == 0 {
        return Err(ApiError::validation("Thread has no messages to summarize"));
    }
    let prompt = build_summary_prompt(subject, &transcript);

    let summary = provider
        .generate(&prompt, &summary_config(max_tokens))
        .await
        .map_err(|e| {
            warn!("[THREAD_SUMMARY] provider failed: {}", e);
            ApiError::Unavailable("Summary service failed, try again later".to_string())
        })?;

    Ok(SummaryResponse {
        summary: summary.trim().to_string(),
        message_count,
    })
}

pub async fn handle_summarize_thread(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SummaryResponse>> {
    user.require(Permission::MessagingUse)?;
    let provider = state
        .llm_provider
        .clone()
        .ok_or_else(|| ApiError::Unavailable("Thread summaries are not configured".to_string()))?;
    let me = user.user_id;

    let (subject, lines) = with_conn(&state.conn, move |conn| {
        let thread = load_for_participant(conn, id, me)?;
        let mut rows: Vec<(String, chrono::DateTime<chrono::Utc>, String)> = messages::table
            .inner_join(users::table.on(users::id.eq(messages::sender_id)))
            .filter(messages::thread_id.eq(id))
            .order((messages::created_at.desc(), messages::id.desc()))
            .limit(MAX_SUMMARY_MESSAGES)
            .select((users::full_name, messages::created_at, messages::body))
            .load(conn)?;
        rows.reverse();

        let lines = rows
            .into_iter()
            .map(|(sender, sent_at, body)| TranscriptLine {
                sender,
                sent_at,
                body,
            })
            .collect::<Vec<_>>();
        Ok((thread.subject, lines))
    })
    .await?;

    let response = summarize(
        provider.as_ref(),
        &subject,
        &lines,
        state.config.llm.max_tokens,
    )
    .await?;
    info!(
        "Summarized {} message(s) of thread {id} for {}",
        response.message_count, user.username
    );
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::Mutex;

    struct MockProvider {
        reply: Result<String, String>,
        seen: Mutex<Vec<(String, Value)>>,
    }

    impl MockProvider {
        fn replying(reply: Result<&str, &str>) -> Self {
            Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for MockProvider {
        async fn generate(
            &self,
            prompt: &str,
            config: &Value,
        ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), config.clone()));
            self.reply.clone().map_err(|e| e.into())
        }
    }

    fn lines() -> Vec<TranscriptLine> {
        vec![
            TranscriptLine {
                sender: "Rana Haddad".into(),
                sent_at: Utc::now(),
                body: "Generator at the depot needs a service".into(),
            },
            TranscriptLine {
                sender: "Omar Saleh".into(),
                sent_at: Utc::now(),
                body: "Booked for Thursday".into(),
            },
        ]
    }

    #[tokio::test]
    async fn test_summary_uses_transcript() {
        let provider = MockProvider::replying(Ok("  Service booked for Thursday.  "));
        let res = summarize(&provider, "Depot generator", &lines(), 250)
            .await
            .unwrap();
        assert_eq!(res.summary, "Service booked for Thursday.");
        assert_eq!(res.message_count, 2);

        let seen = provider.seen.lock().unwrap();
        let (prompt, config) = &seen[0];
        assert!(prompt.contains("Depot generator"));
        assert!(prompt.contains("Omar Saleh: Booked for Thursday"));
        assert_eq!(config["max_tokens"], 250);
    }

    #[tokio::test]
    async fn test_provider_failure_is_unavailable() {
        let provider = MockProvider::replying(Err("upstream 502"));
        let err = summarize(&provider, "Depot generator", &lines(), 250)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_thread_is_rejected_without_calling_provider() {
        let provider = MockProvider::replying(Ok("unused"));
        let err = summarize(&provider, "Quiet", &[], 250).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(provider.seen.lock().unwrap().is_empty());
    }
}
