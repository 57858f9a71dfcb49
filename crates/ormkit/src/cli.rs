//! Migration command-line support.
//!
//! Migrations are code, so the binary lives in the application. A typical
//! `main`:
//!
//! ```no_run
//! use clap::Parser;
//! use ormkit::cli::{self, MigrateArgs};
//! use ormkit::Migration;
//!
//! # fn migrations() -> Vec<Migration> { Vec::new() }
//! #[tokio::main]
//! async fn main() {
//!     cli::init_tracing();
//!     match cli::execute(MigrateArgs::parse(), migrations()).await {
//!         Ok(summary) => println!("{}", summary),
//!         Err(e) => {
//!             eprintln!("Error: {}", e);
//!             std::process::exit(1);
//!         }
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ormkit_core::{Migration, MigrationController, Result};
use ormkit_sqlite::config::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_MIGRATIONS_TABLE};
use ormkit_sqlite::{SqliteConfig, SqliteDatasource};

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "ormkit=info";

/// Command-line arguments for a migration tool.
#[derive(Parser, Debug)]
#[command(name = "ormkit-migrate")]
#[command(version, about = "Apply and revert ormkit migrations", long_about = None)]
pub struct MigrateArgs {
    /// SQLite database file. Uses a throwaway in-memory database if omitted.
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Busy timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_BUSY_TIMEOUT_MS)]
    pub busy_timeout_ms: u64,

    /// Disable foreign key enforcement.
    #[arg(long)]
    pub no_foreign_keys: bool,

    /// Table holding the applied migration log.
    #[arg(long, default_value = DEFAULT_MIGRATIONS_TABLE)]
    pub migrations_table: String,

    /// What to do.
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateCommand {
    /// Apply the next pending migration.
    Up,
    /// Revert the most recently applied migration.
    Down,
    /// Apply every pending migration.
    Latest,
    /// Revert every applied migration.
    Reset,
    /// Print the most recently applied migration.
    Version,
    /// List applied and pending migrations.
    Status,
}

impl MigrateArgs {
    /// Convert command-line arguments to datasource configuration.
    pub fn into_config(self) -> SqliteConfig {
        let config = match self.database {
            Some(path) => SqliteConfig::new(path),
            None => SqliteConfig::in_memory(),
        };
        config
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_foreign_keys(!self.no_foreign_keys)
            .with_migrations_table(self.migrations_table)
    }
}

/// Run one subcommand and describe what happened.
pub async fn run(command: MigrateCommand, controller: &MigrationController) -> Result<String> {
    let summary = match command {
        MigrateCommand::Up => match controller.up().await? {
            Some(name) => format!("applied {}", name),
            None => "already up to date".to_string(),
        },
        MigrateCommand::Down => match controller.down().await? {
            Some(name) => format!("reverted {}", name),
            None => "nothing to revert".to_string(),
        },
        MigrateCommand::Latest => {
            let applied = controller.latest().await?;
            if applied.is_empty() {
                "already up to date".to_string()
            } else {
                format!("applied {}", applied.join(", "))
            }
        }
        MigrateCommand::Reset => {
            let reverted = controller.reset().await?;
            if reverted.is_empty() {
                "nothing to revert".to_string()
            } else {
                format!("reverted {}", reverted.join(", "))
            }
        }
        MigrateCommand::Version => controller.version().await?.to_string(),
        MigrateCommand::Status => {
            let status = controller.status().await?;
            status
                .applied
                .iter()
                .map(|name| format!("[x] {}", name))
                .chain(status.pending.iter().map(|name| format!("[ ] {}", name)))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };
    Ok(summary)
}

/// Open the configured database and run the parsed subcommand over
/// `migrations`.
pub async fn execute(
    args: MigrateArgs,
    migrations: impl IntoIterator<Item = Migration>,
) -> Result<String> {
    let command = args.command;
    let config = args.into_config();
    info!(database = ?config.path, ?command, "running migration command");

    let datasource = Arc::new(SqliteDatasource::open(config)?);
    let controller = MigrationController::new(datasource, migrations);
    run(command, &controller).await
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`, defaulting to
/// [`DEFAULT_LOG_FILTER`]. Does nothing if a subscriber is already set.
pub fn init_tracing() {
    let installed = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let args = MigrateArgs::try_parse_from(["ormkit-migrate", "latest"]).unwrap();
        assert_eq!(args.command, MigrateCommand::Latest);
        assert!(args.database.is_none());

        let config = args.into_config();
        assert_eq!(config, SqliteConfig::in_memory());
    }

    #[test]
    fn test_parse_options() {
        let args = MigrateArgs::try_parse_from([
            "ormkit-migrate",
            "--database",
            "app.db",
            "--busy-timeout-ms",
            "250",
            "--no-foreign-keys",
            "--migrations-table",
            "log",
            "down",
        ])
        .unwrap();
        assert_eq!(args.command, MigrateCommand::Down);

        let config = args.into_config();
        assert_eq!(config.path, Some(PathBuf::from("app.db")));
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.foreign_keys);
        assert_eq!(config.migrations_table, "log");
    }

    #[test]
    fn test_subcommand_required() {
        assert!(MigrateArgs::try_parse_from(["ormkit-migrate"]).is_err());
        assert!(MigrateArgs::try_parse_from(["ormkit-migrate", "sideways"]).is_err());
    }

    #[test]
    fn test_command_definition() {
        use clap::CommandFactory;
        MigrateArgs::command().debug_assert();
    }
}
