//! Transcript and prompt building for thread summaries.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

pub const MAX_SUMMARY_MESSAGES: i64 = 200;
pub const MAX_TRANSCRIPT_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "You summarize internal team conversations for an operations company. \
Be factual and brief. Do not invent details that are not in the transcript.";

#[derive(Debug, Clone)]
pub struct TranscriptLine {
    pub sender: String,
    pub sent_at: DateTime<Utc>,
    pub body: String,
}

impl TranscriptLine {
    fn render(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.sent_at.format("%Y-%m-%d %H:%M"),
            self.sender,
            self.body.replace('\n', " ")
        )
    }
}

/// Renders `lines` (oldest first) into a transcript of at most `max_chars`
/// characters. The newest lines win when the cap is hit. Returns the text
/// and the number of messages it covers.
pub fn build_transcript(lines: &[TranscriptLine], max_chars: usize) -> (String, usize) {
    let mut kept: Vec<String> = Vec::new();
    let mut used = 0;

    for line in lines.iter().rev() {
        let rendered = line.render();
        let len = rendered.chars().count() + 1;
        if used + len > max_chars {
            if kept.is_empty() {
                kept.push(rendered.chars().take(max_chars.saturating_sub(1)).collect());
            }
            break;
        }
        used += len;
        kept.push(rendered);
    }

    kept.reverse();
    let count = kept.len();
    (kept.join("\n"), count)
}

pub fn build_summary_prompt(subject: &str, transcript: &str) -> String {
    format!(
        "Summarize the following conversation titled \"{subject}\".\n\
         List the key points, any decisions made and any open action items \
         with their owners.\n\n\
         Transcript:\n{transcript}\n"
    )
}

/// Generation options handed to the provider.
pub fn summary_config(max_tokens: u32) -> Value {
    json!({
        "system": SYSTEM_PROMPT,
        "max_tokens": max_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn line(sender: &str, minute: u32, body: &str) -> TranscriptLine {
        TranscriptLine {
            sender: sender.to_string(),
            sent_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, minute, 0).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_transcript_is_chronological() {
        let lines = vec![
            line("Rana", 0, "Pump at site B failed"),
            line("Omar", 5, "Sending a technician\nafter lunch"),
        ];
        let (text, count) = build_transcript(&lines, MAX_TRANSCRIPT_CHARS);
        assert_eq!(count, 2);
        assert_eq!(
            text,
            "[2026-03-02 09:00] Rana: Pump at site B failed\n\
             [2026-03-02 09:05] Omar: Sending a technician after lunch"
        );
    }

    #[test]
    fn test_cap_drops_oldest_lines() {
        let lines: Vec<_> = (0..50)
            .map(|i| line("Sam", i, &format!("update number {i}")))
            .collect();
        let (text, count) = build_transcript(&lines, 200);
        assert!(text.chars().count() <= 200);
        assert!(count < 50);
        assert!(text.ends_with("update number 49"));
        assert!(!text.contains("update number 0\n"));
    }

    #[test]
    fn test_single_oversized_line_is_truncated() {
        let lines = vec![line("Sam", 0, &"a".repeat(500))];
        let (text, count) = build_transcript(&lines, 100);
        assert_eq!(count, 1);
        assert_eq!(text.chars().count(), 99);
    }

    #[test]
    fn test_prompt_mentions_subject_and_transcript() {
        let prompt = build_summary_prompt("Site B pump", "[..] Rana: failed");
        assert!(prompt.contains("\"Site B pump\""));
        assert!(prompt.contains("Rana: failed"));
        assert_eq!(summary_config(300)["max_tokens"], 300);
    }
}
