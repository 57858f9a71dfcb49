//! Migrations driving the tables that models read and write.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use ormkit_core::{
    record, types, Datasource, Error, FieldType, Hydrated, MemoryDatasource, Migration,
    MigrationController, ModelBuilder, ModelRegistry, Query, TableDef, Version,
};

fn user_schema() -> FieldType {
    types::schema([
        ("id", types::uuid().default_with(|| uuid::Uuid::new_v4().into())),
        ("name", types::string().required()),
        ("admin", types::boolean().default(false)),
    ])
}

fn catalogue() -> Vec<Migration> {
    vec![
        Migration::new(
            "002-posts",
            |ds| async move {
                ds.create_table(&TableDef::new("posts").uuid("id").string("title"))
                    .await?;
                Ok::<_, Error>(())
            },
            |ds| async move {
                ds.drop_table("posts").await?;
                Ok::<_, Error>(())
            },
        ),
        Migration::new(
            "001-users",
            |ds| async move {
                let schema = user_schema().into_schema()?;
                ds.create_table(&TableDef::for_schema("users", &schema)).await?;
                Ok::<_, Error>(())
            },
            |ds| async move {
                ds.drop_table("users").await?;
                Ok::<_, Error>(())
            },
        ),
    ]
}

#[tokio::test]
async fn test_stepping_up_matches_latest() {
    let stepped = Arc::new(MemoryDatasource::new());
    let controller = MigrationController::new(stepped.clone(), catalogue());
    while controller.up().await.unwrap().is_some() {}

    let batched = Arc::new(MemoryDatasource::new());
    let other = MigrationController::new(batched.clone(), catalogue());
    assert_eq!(other.latest().await.unwrap(), vec!["001-users", "002-posts"]);

    assert_eq!(stepped.table_names(), batched.table_names());
    assert_eq!(controller.version().await.unwrap(), other.version().await.unwrap());
    assert_eq!(
        controller.version().await.unwrap(),
        Version::Applied("002-posts".to_string())
    );
}

#[tokio::test]
async fn test_reset_returns_to_none() {
    let ds = Arc::new(MemoryDatasource::new());
    let controller = MigrationController::new(ds.clone(), catalogue());

    controller.latest().await.unwrap();
    assert!(ds.has_table("users").await.unwrap());

    controller.reset().await.unwrap();
    assert_eq!(controller.version().await.unwrap(), Version::None);
    assert!(ds.table_names().is_empty());

    let status = controller.status().await.unwrap();
    assert!(status.applied.is_empty());
    assert_eq!(status.pending, vec!["001-users", "002-posts"]);
}

#[tokio::test]
async fn test_models_over_migrated_tables() {
    let ds = Arc::new(MemoryDatasource::new());
    MigrationController::new(ds.clone(), catalogue())
        .latest()
        .await
        .unwrap();

    let users = ModelBuilder::new("User")
        .with_datasource_table(ds.clone(), "users")
        .with_schema(user_schema())
        .finalise_in(&ModelRegistry::new())
        .unwrap();

    users.build(record! { "name" => "ada", "admin" => true }).await.unwrap();
    users.build(record! { "name" => "bob" }).await.unwrap();

    let admins = users.find(record! { "admin" => true }).await.unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].get("name").and_then(|v| v.as_str()), Some("ada"));

    let hydrated = users
        .query_builder(|table| async move {
            let query = Query::table(table.name()).where_eq("name", "bob").first();
            table.run(query).await
        })
        .await
        .unwrap();
    let Hydrated::One(mut bob) = hydrated else {
        panic!("expected a single row");
    };
    assert!(!bob.validates());
    bob.update(record! { "admin" => true }).await.unwrap();
    assert_eq!(users.count(record! { "admin" => true }).await.unwrap(), 2);
}
