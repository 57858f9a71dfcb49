//! Migration commands end to end.

use std::sync::Arc;

use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use ormkit::cli::{self, MigrateArgs, MigrateCommand};
use ormkit::{Datasource, Error, MemoryDatasource, Migration, MigrationController, TableDef};

fn catalogue() -> Vec<Migration> {
    ["1-one", "2-two", "3-three"]
        .into_iter()
        .map(|name| {
            let table = name.split('-').nth(1).unwrap_or(name).to_string();
            let dropped = table.clone();
            Migration::new(
                name,
                move |ds| {
                    let table = table.clone();
                    async move {
                        ds.create_table(&TableDef::new(table).uuid("id")).await?;
                        Ok::<_, Error>(())
                    }
                },
                move |ds| {
                    let table = dropped.clone();
                    async move {
                        ds.drop_table(&table).await?;
                        Ok::<_, Error>(())
                    }
                },
            )
        })
        .collect()
}

#[tokio::test]
async fn test_run_walks_versions() {
    let controller = MigrationController::new(Arc::new(MemoryDatasource::new()), catalogue());

    assert_eq!(cli::run(MigrateCommand::Version, &controller).await.unwrap(), "none");
    assert_eq!(cli::run(MigrateCommand::Up, &controller).await.unwrap(), "applied 1-one");
    assert_eq!(
        cli::run(MigrateCommand::Status, &controller).await.unwrap(),
        "[x] 1-one\n[ ] 2-two\n[ ] 3-three"
    );
    assert_eq!(
        cli::run(MigrateCommand::Latest, &controller).await.unwrap(),
        "applied 2-two, 3-three"
    );
    assert_eq!(
        cli::run(MigrateCommand::Latest, &controller).await.unwrap(),
        "already up to date"
    );
    assert_eq!(cli::run(MigrateCommand::Version, &controller).await.unwrap(), "3-three");
    assert_eq!(cli::run(MigrateCommand::Down, &controller).await.unwrap(), "reverted 3-three");
    assert_eq!(
        cli::run(MigrateCommand::Reset, &controller).await.unwrap(),
        "reverted 2-two, 1-one"
    );
    assert_eq!(
        cli::run(MigrateCommand::Down, &controller).await.unwrap(),
        "nothing to revert"
    );
}

#[tokio::test]
async fn test_execute_against_database_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("cli.db");
    let db = db.to_str().unwrap();

    let args = MigrateArgs::parse_from(["ormkit-migrate", "--database", db, "latest"]);
    assert_eq!(
        cli::execute(args, catalogue()).await.unwrap(),
        "applied 1-one, 2-two, 3-three"
    );

    let args = MigrateArgs::parse_from(["ormkit-migrate", "-d", db, "version"]);
    assert_eq!(cli::execute(args, catalogue()).await.unwrap(), "3-three");

    let args = MigrateArgs::parse_from(["ormkit-migrate", "-d", db, "reset"]);
    cli::execute(args, catalogue()).await.unwrap();

    let args = MigrateArgs::parse_from(["ormkit-migrate", "-d", db, "status"]);
    assert_eq!(
        cli::execute(args, catalogue()).await.unwrap(),
        "[ ] 1-one\n[ ] 2-two\n[ ] 3-three"
    );
}

#[tokio::test]
async fn test_init_tracing_is_repeatable() {
    cli::init_tracing();
    cli::init_tracing();
}
