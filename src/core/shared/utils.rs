use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::core::config::DatabaseConfig;
use crate::core::shared::error::ApiError;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(config: &DatabaseConfig) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(config.url.clone());
    Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .build(manager)
}

/// Pool that opens connections on first use. Used by tests and by the
/// server when the database is not reachable yet at boot.
pub fn create_lazy_conn(config: &DatabaseConfig) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(config.url.clone());
    Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .build_unchecked(manager)
}

/// Run database migrations
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS).map_err(
        |e| -> Box<dyn std::error::Error + Send + Sync> {
            Box::new(std::io::Error::other(format!("Migration error: {}", e)))
        },
    )?;
    for version in applied {
        log::info!("Applied migration {}", version);
    }
    Ok(())
}

/// Runs `f` on a pooled connection inside the blocking thread pool.
pub async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, ApiError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

/// Strips credentials from a postgres URL for logging.
pub fn redact_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => url.to_string(),
    }
}

/// Trims a required text field, rejecting blank values.
pub fn require_text(field: &str, value: &str, max_len: usize) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ApiError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional text field; blank becomes `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates. Use with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Upper-cases and checks a three letter ISO 4217 code.
pub fn normalize_currency(code: &str) -> Result<String, ApiError> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::validation(format!(
            "Invalid currency code '{code}'"
        )));
    }
    Ok(code)
}

/// Human readable sequence numbers such as `SJ-2026-0042`.
pub fn sequence_reference(prefix: &str, year: i32, seq: i64) -> String {
    format!("{prefix}-{year}-{seq:04}")
}

/// Retries `attempt` when it loses a race on a generated unique reference.
pub fn with_sequence_retry<T>(
    mut attempt: impl FnMut() -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut tries = 1;
    loop {
        match attempt() {
            Err(ApiError::Conflict(msg)) if tries < MAX_ATTEMPTS => {
                log::debug!("Reference collision, retrying ({tries}): {msg}");
                tries += 1;
            }
            other => return other,
        }
    }
}

/// Next sequence number after the highest existing `<prefix><n>` value.
pub fn next_sequence(prefix: &str, existing: &[String]) -> i64 {
    existing
        .iter()
        .filter_map(|r| r.strip_prefix(prefix))
        .filter_map(|n| n.parse::<i64>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

/// `ILIKE` pattern for a free-text search term, with wildcards escaped.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_database_url() {
        assert_eq!(
            redact_database_url("postgres://pulse:secret@db:5432/pulse"),
            "postgres://***@db:5432/pulse"
        );
        assert_eq!(
            redact_database_url("postgres://localhost/pulse"),
            "postgres://localhost/pulse"
        );
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("title", "  Fix pump  ", 50).unwrap(), "Fix pump");
        assert!(require_text("title", "   ", 50).is_err());
        assert!(require_text("title", "abcdef", 5).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" a ".into())), Some("a".into()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn test_double_option() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "double_option")]
            due: Option<Option<String>>,
        }
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.due, None);
        let cleared: Patch = serde_json::from_str(r#"{"due":null}"#).unwrap();
        assert_eq!(cleared.due, Some(None));
        let set: Patch = serde_json::from_str(r#"{"due":"2026-03-01"}"#).unwrap();
        assert_eq!(set.due, Some(Some("2026-03-01".into())));
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency(" aed ").unwrap(), "AED");
        assert!(normalize_currency("DOLLARS").is_err());
        assert!(normalize_currency("U5D").is_err());
    }

    #[test]
    fn test_sequence_reference() {
        assert_eq!(sequence_reference("SJ", 2026, 42), "SJ-2026-0042");
        assert_eq!(sequence_reference("PI", 2026, 12345), "PI-2026-12345");
    }

    #[test]
    fn test_next_sequence_uses_highest_suffix() {
        let existing = vec![
            "SJ-2026-0009".to_string(),
            "SJ-2026-0010".to_string(),
            "SJ-2026-0002".to_string(),
        ];
        assert_eq!(next_sequence("SJ-2026-", &existing), 11);
        assert_eq!(next_sequence("SJ-2027-", &existing), 1);
        assert_eq!(next_sequence("SJ-2026-", &["SJ-2026-10000".to_string()]), 10001);
    }

    #[test]
    fn test_sequence_retry_gives_up_after_three() {
        let mut calls = 0;
        let result: Result<(), ApiError> = with_sequence_retry(|| {
            calls += 1;
            Err(ApiError::conflict("duplicate"))
        });
        assert!(matches!(result, Err(ApiError::Conflict(_))));
        assert_eq!(calls, 3);

        let mut calls = 0;
        let result = with_sequence_retry(|| {
            calls += 1;
            if calls == 1 {
                Err(ApiError::conflict("duplicate"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern(" pump "), "%pump%");
    }
}
