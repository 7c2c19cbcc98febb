//! Bootstrap and application initialization logic

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use diesel::prelude::*;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::config::AppConfig;
use crate::core::shared::schema::{roles, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{create_conn, redact_database_url, run_migrations, DbPool};
use crate::directory::types::{RoleRow, UserRow};
use crate::security::password::{generate_temporary_password, hash_password, PasswordPolicy};
use crate::security::permissions::{system_roles, ADMIN_ROLE};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD_ENV: &str = "PULSE_ADMIN_PASSWORD";

/// `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// Creates the pool and applies pending migrations.
pub fn init_database(config: &AppConfig) -> Result<DbPool> {
    info!(
        "Connecting to {}",
        redact_database_url(&config.database.url)
    );
    let pool = create_conn(&config.database).context("Database pool creation failed")?;
    run_migrations(&pool).map_err(|e| anyhow!("Failed to run migrations: {e}"))?;
    info!("Database migrations completed successfully");
    Ok(pool)
}

pub fn create_app_state(config: AppConfig, pool: DbPool) -> Arc<AppState> {
    if config.auth.uses_dev_secret() {
        warn!("auth.jwt_secret is the development default - DO NOT USE IN PRODUCTION");
    }
    let state = AppState::new(config, pool);
    info!(
        "Thread summaries {}",
        if state.llm_provider.is_some() {
            "enabled"
        } else {
            "disabled (llm.api_url / llm.api_key not set)"
        }
    );
    Arc::new(state)
}

#[derive(Debug, Default)]
pub struct SeedReport {
    pub roles_created: usize,
    pub admin_created: bool,
    /// Only set when the password was generated rather than supplied.
    pub generated_password: Option<String>,
}

/// Creates the system roles and the `admin` account when missing.
/// Safe to run repeatedly.
pub fn seed_defaults(pool: &DbPool, admin_password: Option<String>) -> Result<SeedReport> {
    let mut conn = pool.get().context("No database connection for seeding")?;
    let mut report = SeedReport::default();

    conn.transaction::<_, anyhow::Error, _>(|conn| {
        let now = Utc::now();
        for role in system_roles() {
            let permissions: Vec<String> = role
                .permissions
                .iter()
                .map(|p| p.as_str().to_string())
                .collect();

            let existing: Option<RoleRow> = roles::table
                .filter(roles::name.eq(role.name))
                .select(RoleRow::as_select())
                .first(conn)
                .optional()?;

            match existing {
                Some(mut row) => {
                    row.is_system = true;
                    if row.name == ADMIN_ROLE {
                        row.permissions = permissions;
                    }
                    row.updated_at = now;
                    diesel::update(roles::table.find(row.id))
                        .set(&row)
                        .execute(conn)?;
                }
                None => {
                    diesel::insert_into(roles::table)
                        .values(&RoleRow {
                            id: Uuid::new_v4(),
                            name: role.name.to_string(),
                            description: Some(role.description.to_string()),
                            permissions,
                            is_system: true,
                            created_at: now,
                            updated_at: now,
                        })
                        .execute(conn)?;
                    report.roles_created += 1;
                }
            }
        }

        let admin_exists: bool = diesel::select(diesel::dsl::exists(
            users::table.filter(users::username.eq(ADMIN_USERNAME)),
        ))
        .get_result(conn)?;
        if admin_exists {
            return Ok(());
        }

        let password = match admin_password {
            Some(password) => {
                PasswordPolicy::default()
                    .enforce(&password, Some(ADMIN_USERNAME))
                    .map_err(|e| anyhow!("{ADMIN_PASSWORD_ENV} rejected: {e}"))?;
                password
            }
            None => {
                let generated = generate_temporary_password(16);
                report.generated_password = Some(generated.clone());
                generated
            }
        };

        let admin_role_id: Uuid = roles::table
            .filter(roles::name.eq(ADMIN_ROLE))
            .select(roles::id)
            .first(conn)?;

        diesel::insert_into(users::table)
            .values(&UserRow {
                id: Uuid::new_v4(),
                username: ADMIN_USERNAME.to_string(),
                email: "admin@localhost".to_string(),
                full_name: "Administrator".to_string(),
                password_hash: hash_password(&password)?,
                role_id: admin_role_id,
                is_active: true,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            })
            .execute(conn)?;
        report.admin_created = true;
        Ok(())
    })?;

    info!(
        "Seed complete: {} role(s) created, admin {}",
        report.roles_created,
        if report.admin_created {
            "created"
        } else {
            "already present"
        }
    );
    Ok(report)
}
