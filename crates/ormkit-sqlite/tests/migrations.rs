//! Migrations against an on-disk database.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use ormkit_core::{
    record, types, Datasource, Error, Migration, MigrationController, ModelBuilder,
    ModelRegistry, TableDef, Version,
};
use ormkit_sqlite::{SqliteConfig, SqliteDatasource};

fn catalogue() -> Vec<Migration> {
    vec![
        Migration::new(
            "001-accounts",
            |ds| async move {
                ds.create_table(
                    &TableDef::new("accounts")
                        .increments("_id")
                        .uuid("id")
                        .string("email"),
                )
                .await?;
                Ok::<_, Error>(())
            },
            |ds| async move {
                ds.drop_table("accounts").await?;
                Ok::<_, Error>(())
            },
        ),
        Migration::new(
            "002-sessions",
            |ds| async move {
                ds.create_table(&TableDef::new("sessions").uuid("id").date("expires"))
                    .await?;
                Ok::<_, Error>(())
            },
            |ds| async move {
                ds.drop_table("sessions").await?;
                Ok::<_, Error>(())
            },
        ),
    ]
}

fn open(dir: &TempDir) -> Arc<SqliteDatasource> {
    let config = SqliteConfig::new(dir.path().join("app.db"));
    Arc::new(SqliteDatasource::open(config).unwrap())
}

#[tokio::test]
async fn test_version_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let ds = open(&dir);
        let controller = MigrationController::new(ds.clone(), catalogue());
        assert_eq!(controller.up().await.unwrap().as_deref(), Some("001-accounts"));
    }

    let ds = open(&dir);
    let controller = MigrationController::new(ds.clone(), catalogue());
    assert_eq!(
        controller.version().await.unwrap(),
        Version::Applied("001-accounts".to_string())
    );
    assert_eq!(controller.latest().await.unwrap(), vec!["002-sessions"]);
    assert!(ds.has_table("sessions").await.unwrap());
}

#[tokio::test]
async fn test_down_and_reset() {
    let dir = TempDir::new().unwrap();
    let ds = open(&dir);
    let controller = MigrationController::new(ds.clone(), catalogue());

    controller.latest().await.unwrap();
    assert_eq!(controller.down().await.unwrap().as_deref(), Some("002-sessions"));
    assert!(!ds.has_table("sessions").await.unwrap());
    assert!(ds.has_table("accounts").await.unwrap());

    controller.up().await.unwrap();
    assert_eq!(
        controller.reset().await.unwrap(),
        vec!["002-sessions", "001-accounts"]
    );
    assert!(controller.version().await.unwrap().is_none());
    assert!(!ds.has_table("accounts").await.unwrap());
}

#[tokio::test]
async fn test_failed_step_is_not_recorded() {
    let dir = TempDir::new().unwrap();
    let ds = open(&dir);
    let clash = Migration::new(
        "003-clash",
        |ds| async move {
            ds.create_table(&TableDef::new("accounts").uuid("id")).await?;
            Ok::<_, Error>(())
        },
        |_| async { Ok::<_, Error>(()) },
    );
    let controller = MigrationController::new(ds.clone(), catalogue()).with_step(clash);

    let err = controller.latest().await.unwrap_err();
    assert!(err.to_string().contains("003-clash"), "{err}");

    let status = controller.status().await.unwrap();
    assert_eq!(status.applied, vec!["001-accounts", "002-sessions"]);
    assert_eq!(status.pending, vec!["003-clash"]);
}

#[tokio::test]
async fn test_model_over_migrated_table() {
    let dir = TempDir::new().unwrap();
    let ds = open(&dir);
    MigrationController::new(ds.clone(), catalogue())
        .latest()
        .await
        .unwrap();

    let accounts = ModelBuilder::new("Account")
        .with_datasource_table(ds.clone(), "accounts")
        .with_schema(types::schema([("email", types::string().required())]))
        .with_phantom_id()
        .finalise_in(&ModelRegistry::new())
        .unwrap();

    let account = accounts
        .build(record! { "email" => "ada@example.com" })
        .await
        .unwrap();
    assert_eq!(account.real_id(), Some(&ormkit_core::Value::Int(1)));

    let again = accounts
        .upsert(record! { "email" => "ada@example.com" }, None)
        .await
        .unwrap();
    assert_eq!(again.id(), account.id());
    assert_eq!(accounts.count(record! {}).await.unwrap(), 1);
}
