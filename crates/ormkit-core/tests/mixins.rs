//! Timestamps, phantom ids and registry behaviour through the public API.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use ormkit_core::model::mixins::{CREATED_ON, PHANTOM_ID, UPDATED_ON};
use ormkit_core::{
    record, types, Datasource, Error, MemoryDatasource, Model, ModelBuilder, ModelRegistry,
    PhantomIdOptions, TableDef, Value,
};

async fn install(ds: &MemoryDatasource, model: &Model) {
    let schema = model.schema().expect("model has a schema");
    ds.create_table(&TableDef::for_schema(model.table(), schema))
        .await
        .unwrap();
}

fn article() -> ModelBuilder {
    ModelBuilder::new("Article").with_schema(types::schema([
        ("id", types::uuid().default_with(|| uuid::Uuid::new_v4().into())),
        ("title", types::string().required()),
        ("published", types::boolean().default(false)),
    ]))
}

#[tokio::test]
async fn test_timestamps_on_create_and_update() {
    let ds = Arc::new(MemoryDatasource::new());
    let model = article()
        .with_datasource(ds.clone())
        .with_timestamps()
        .finalise_in(&ModelRegistry::new())
        .unwrap();
    install(&ds, &model).await;

    let mut instance = model.build(record! { "title" => "first" }).await.unwrap();
    let created = instance.get(CREATED_ON).and_then(Value::as_date).copied().unwrap();
    let updated = instance.get(UPDATED_ON).and_then(Value::as_date).copied().unwrap();
    assert_eq!(created, updated);

    tokio::time::sleep(Duration::from_millis(5)).await;
    instance.update(record! { "published" => true }).await.unwrap();

    assert_eq!(instance.get(CREATED_ON).and_then(Value::as_date), Some(&created));
    let touched = instance.get(UPDATED_ON).and_then(Value::as_date).copied().unwrap();
    assert!(touched > updated);

    let id = instance.id().cloned().unwrap();
    let fetched = model.id(id).await.unwrap();
    assert_eq!(fetched.get(CREATED_ON), Some(&Value::Date(created)));
    assert_eq!(fetched.get(UPDATED_ON), Some(&Value::Date(touched)));
    assert_eq!(fetched.get("published"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn test_timestamps_are_stored_as_millis() {
    let ds = Arc::new(MemoryDatasource::new());
    let model = article()
        .with_datasource(ds.clone())
        .with_timestamps()
        .finalise_in(&ModelRegistry::new())
        .unwrap();
    install(&ds, &model).await;

    let instance = model.build(record! { "title" => "stored" }).await.unwrap();
    let created = instance.get(CREATED_ON).and_then(Value::as_date).unwrap();

    let rows = ds.rows("Article");
    assert_eq!(rows[0][CREATED_ON], Value::Int(created.timestamp_millis()));
    assert_eq!(rows[0]["published"], Value::Int(0));
}

#[tokio::test]
async fn test_phantom_id_hides_surrogate_key() {
    let ds = Arc::new(MemoryDatasource::new());
    let model = ModelBuilder::new("Ticket")
        .with_datasource(ds.clone())
        .with_schema(types::schema([("subject", types::string())]))
        .with_phantom_id()
        .finalise_in(&ModelRegistry::new())
        .unwrap();
    install(&ds, &model).await;

    let first = model.build(record! { "subject" => "a" }).await.unwrap();
    let second = model.build(record! { "subject" => "b" }).await.unwrap();

    assert_eq!(first.real_id(), Some(&Value::Int(1)));
    assert_eq!(second.real_id(), Some(&Value::Int(2)));
    assert!(first.get(PHANTOM_ID).is_none());
    assert!(!first.has_field(PHANTOM_ID));
    assert!(first.fields().all(|f| f != PHANTOM_ID));
    assert!(first.to_json().get(PHANTOM_ID).is_none());

    let public = first.id().and_then(Value::as_str).unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&public).is_ok());

    let fetched = model.id(public.as_str()).await.unwrap();
    assert_eq!(fetched.real_id(), Some(&Value::Int(1)));
    assert!(fetched.get(PHANTOM_ID).is_none());
    assert_eq!(
        serde_json::to_value(&fetched).unwrap(),
        serde_json::json!({ "id": public, "subject": "a" })
    );
}

#[tokio::test]
async fn test_phantom_id_rejects_writes_to_hidden_key() {
    let ds = Arc::new(MemoryDatasource::new());
    let model = ModelBuilder::new("Hidden")
        .with_datasource(ds.clone())
        .with_schema(types::schema([("subject", types::string())]))
        .with_phantom_id()
        .finalise_in(&ModelRegistry::new())
        .unwrap();
    install(&ds, &model).await;

    let mut instance = model.build(record! { "subject" => "a" }).await.unwrap();
    assert!(matches!(
        instance.set(PHANTOM_ID, 7),
        Err(Error::UnknownField(ref field)) if field == PHANTOM_ID
    ));
    assert!(matches!(instance.set("id", "x"), Err(Error::ImmutableId)));
}

#[tokio::test]
async fn test_phantom_id_with_custom_types() {
    let ds = Arc::new(MemoryDatasource::new());
    let options = PhantomIdOptions::default()
        .with_id_type(types::string().default_with(|| Value::from("fixed")));
    let model = ModelBuilder::new("Custom")
        .with_datasource(ds.clone())
        .with_schema(types::schema([("subject", types::string())]))
        .with_phantom_id_options(options)
        .finalise_in(&ModelRegistry::new())
        .unwrap();
    install(&ds, &model).await;

    let instance = model.build(record! { "subject" => "a" }).await.unwrap();
    assert_eq!(instance.id(), Some(&Value::from("fixed")));
    assert_eq!(instance.real_id(), Some(&Value::Int(1)));
}

#[test]
fn test_capabilities_follow_application_order() {
    let model = article()
        .with_timestamps()
        .with_phantom_id()
        .finalise_in(&ModelRegistry::new())
        .unwrap();
    assert_eq!(
        model.capabilities(),
        vec!["base", "withSchema", "extendSchema", "withTimestamps", "extendSchema", "withPhantomId"]
    );
}

#[test]
fn test_finalise_uses_global_registry() {
    let first = ModelBuilder::new("GlobalWidget").finalise().unwrap();
    assert!(Arc::ptr_eq(&ModelRegistry::global().get("GlobalWidget").unwrap(), &first));

    let second = article().finalise().unwrap();
    let replacement = ModelBuilder::new("GlobalWidget").with_timestamps().finalise();
    assert!(matches!(
        replacement,
        Err(Error::Config(ormkit_core::ConfigError::NoSchemaToExtend { .. }))
    ));
    assert!(Arc::ptr_eq(&ModelRegistry::global().get("Article").unwrap(), &second));
    assert!(Arc::ptr_eq(&ModelRegistry::global().get("GlobalWidget").unwrap(), &first));
}

#[tokio::test]
async fn test_model_without_datasource() {
    let model = article().finalise_in(&ModelRegistry::new()).unwrap();
    let err = model.build(record! { "title" => "x" }).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ormkit_core::ConfigError::NoDatasource { ref model }) if model == "Article"
    ));
}
