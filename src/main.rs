use anyhow::{bail, Context, Result};
use log::{error, info, warn};

use pulse::core::config::AppConfig;
use pulse::main_module::{
    create_app_state, init_database, init_logging, run_axum_server, seed_defaults,
    ADMIN_PASSWORD_ENV, ADMIN_USERNAME,
};

const USAGE: &str = "\
Tabdeel Pulse operations backend

Usage: pulse [COMMAND]

Commands:
  serve     Run migrations, then serve the API and UI (default)
  migrate   Apply pending database migrations and exit
  seed      Create system roles and the admin user if missing
  --help    Show this message

Configuration is read from pulse.toml (or $PULSE_CONFIG) and PULSE_* variables.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Serve,
    Migrate,
    Seed,
    Help,
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args.get(1).map(String::as_str) {
        None | Some("serve") => Ok(Command::Serve),
        Some("migrate") => Ok(Command::Migrate),
        Some("seed") => Ok(Command::Seed),
        Some("--help") | Some("-h") | Some("help") => Ok(Command::Help),
        Some(other) => bail!("Unknown command: {other}\nRun 'pulse --help' for usage information"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = parse_command(&args)?;
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    init_logging();
    let config = AppConfig::load().context("Failed to load configuration")?;
    info!(
        "Tabdeel Pulse {} starting ({:?})",
        env!("CARGO_PKG_VERSION"),
        command
    );

    let db_config = config.clone();
    let pool = tokio::task::spawn_blocking(move || init_database(&db_config))
        .await
        .context("Database initialization task failed")??;

    match command {
        Command::Migrate => {
            info!("Migrations applied");
            Ok(())
        }
        Command::Seed => {
            let password = std::env::var(ADMIN_PASSWORD_ENV).ok();
            let report = tokio::task::spawn_blocking(move || seed_defaults(&pool, password))
                .await
                .context("Seed task failed")??;
            if let Some(password) = report.generated_password {
                warn!(
                    "Generated password for '{ADMIN_USERNAME}': {password} (shown once; change it after first login)"
                );
            }
            Ok(())
        }
        Command::Serve => {
            let state = create_app_state(config, pool);
            run_axum_server(state).await.map_err(|e| {
                error!("Server stopped with error: {}", e);
                e.into()
            })
        }
        Command::Help => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(&args(&["pulse"])).unwrap(), Command::Serve);
        assert_eq!(parse_command(&args(&["pulse", "migrate"])).unwrap(), Command::Migrate);
        assert_eq!(parse_command(&args(&["pulse", "seed"])).unwrap(), Command::Seed);
        assert_eq!(parse_command(&args(&["pulse", "-h"])).unwrap(), Command::Help);
        assert!(parse_command(&args(&["pulse", "install"])).is_err());
    }
}
