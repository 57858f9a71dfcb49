//! Built-in capability layers.
//!
//! Each mixin is a value that captures its arguments and implements
//! [`Mixin`]; the [`ModelBuilder`](super::ModelBuilder) methods are thin
//! wrappers around them.

use std::sync::Arc;

use async_trait::async_trait;

use super::builder::{Mixin, ModelDef};
use super::hooks::{Hook, HookContext, HookKind, HookSet};
use crate::datasource::{Datasource, QueryOutput};
use crate::error::{ConfigError, Result};
use crate::schema::{types, FieldType, ValidateOptions};
use crate::value::Value;

/// Field holding the creation time.
pub const CREATED_ON: &str = "createdOn";
/// Field holding the last update time.
pub const UPDATED_ON: &str = "updatedOn";
/// Hidden surrogate key field.
pub const PHANTOM_ID: &str = "_id";
/// Public primary identifier field.
pub const ID: &str = "id";

/// Binds a datasource and storage table.
pub struct WithDatasource {
    datasource: Arc<dyn Datasource>,
    table: Option<String>,
}

impl WithDatasource {
    /// Bind `datasource`, storing rows in a table named after the model.
    pub fn new(datasource: Arc<dyn Datasource>) -> Self {
        Self {
            datasource,
            table: None,
        }
    }

    /// Store rows in `table` instead.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

impl Mixin for WithDatasource {
    fn apply(self, def: ModelDef) -> Result<ModelDef> {
        let table = self.table.unwrap_or_else(|| def.name().to_string());
        Ok(def
            .bind_datasource(self.datasource, table)
            .push_layer("withDatasource", HookSet::new()))
    }
}

/// Binds a schema and validates instances before every write.
pub struct WithSchema {
    schema: FieldType,
}

impl WithSchema {
    /// Bind `schema`, which must be an object type with declared keys.
    pub fn new(schema: FieldType) -> Self {
        Self { schema }
    }
}

impl Mixin for WithSchema {
    fn apply(self, def: ModelDef) -> Result<ModelDef> {
        let schema = self.schema.into_schema()?;
        let hooks = HookSet::new()
            .on_hook(HookKind::BeforeCreate, ValidateHook)
            .on_hook(HookKind::BeforeUpdate, ValidateHook);
        Ok(def.bind_schema(schema).push_layer("withSchema", hooks))
    }
}

/// Validates the instance against the model's current schema, wrapped in
/// `beforeValidate`/`afterValidate`.
struct ValidateHook;

#[async_trait]
impl Hook for ValidateHook {
    async fn call(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        let model = ctx.model;
        let Some(schema) = model.schema() else {
            return Ok(());
        };
        if !ctx.instance().is_some_and(|i| i.validates()) {
            return Ok(());
        }

        model.dispatch(HookKind::BeforeValidate, ctx).await?;

        if let Some(instance) = ctx.instance_mut() {
            let validated = schema.validate(instance.values(), ValidateOptions::all_errors())?;
            instance.apply_validated(validated);
        }

        model.dispatch(HookKind::AfterValidate, ctx).await
    }
}

/// Adds or replaces schema fields. Fails when no schema is bound.
pub struct ExtendSchema {
    fields: Vec<(String, FieldType)>,
}

impl ExtendSchema {
    /// Extend with `fields`.
    pub fn new<K: Into<String>>(fields: impl IntoIterator<Item = (K, FieldType)>) -> Self {
        Self {
            fields: fields.into_iter().map(|(k, f)| (k.into(), f)).collect(),
        }
    }
}

impl Mixin for ExtendSchema {
    fn apply(self, def: ModelDef) -> Result<ModelDef> {
        let Some(existing) = def.schema() else {
            return Err(ConfigError::NoSchemaToExtend {
                model: def.name().to_string(),
            }
            .into());
        };
        let extended = existing.extend(self.fields);
        Ok(def
            .bind_schema(extended)
            .push_layer("extendSchema", HookSet::new()))
    }
}

/// Maintains `createdOn` and `updatedOn`.
pub struct WithTimestamps;

impl Mixin for WithTimestamps {
    fn apply(self, def: ModelDef) -> Result<ModelDef> {
        let def = ExtendSchema::new([
            (CREATED_ON, types::date().default_with(Value::now)),
            (UPDATED_ON, types::date().default_with(Value::now)),
        ])
        .apply(def)?;

        let hooks = HookSet::new()
            .on(HookKind::BeforeCreate, |ctx| {
                if let Some(instance) = ctx.instance_mut() {
                    let now = Value::now();
                    instance.set(CREATED_ON, now.clone())?;
                    instance.set(UPDATED_ON, now)?;
                }
                Ok(())
            })
            .on(HookKind::BeforeUpdate, |ctx| {
                if let Some(instance) = ctx.instance_mut() {
                    instance.set(UPDATED_ON, Value::now())?;
                }
                Ok(())
            });
        Ok(def.push_layer("withTimestamps", hooks))
    }
}

/// Field types used by [`WithPhantomId`].
#[derive(Debug, Clone)]
pub struct PhantomIdOptions {
    /// Type of the public `id` field.
    pub id_type: FieldType,
    /// Type of the hidden `_id` field.
    pub phantom_id_type: FieldType,
}

impl PhantomIdOptions {
    /// Replace the public id type.
    pub fn with_id_type(mut self, id_type: FieldType) -> Self {
        self.id_type = id_type;
        self
    }

    /// Replace the surrogate key type.
    pub fn with_phantom_id_type(mut self, phantom_id_type: FieldType) -> Self {
        self.phantom_id_type = phantom_id_type;
        self
    }
}

impl Default for PhantomIdOptions {
    fn default() -> Self {
        Self {
            id_type: types::uuid().default_with(|| uuid::Uuid::new_v4().into()),
            phantom_id_type: types::number(),
        }
    }
}

/// Hides a storage-generated surrogate key behind a public id.
///
/// The surrogate stays in the instance snapshot
/// ([`Instance::real_id`](super::Instance::real_id)) but never appears in the
/// live record, the accessors, or serialized output.
pub struct WithPhantomId {
    options: PhantomIdOptions,
}

impl WithPhantomId {
    /// Create the layer.
    pub fn new(options: PhantomIdOptions) -> Self {
        Self { options }
    }
}

impl Mixin for WithPhantomId {
    fn apply(self, def: ModelDef) -> Result<ModelDef> {
        let def = ExtendSchema::new([
            (PHANTOM_ID, self.options.phantom_id_type),
            (ID, self.options.id_type),
        ])
        .apply(def)?;

        let hooks = HookSet::new().on(HookKind::AfterCreate, |ctx| {
            let key = ctx.outcome.as_ref().and_then(QueryOutput::generated_key);
            if let (Some(key), Some(instance)) = (key, ctx.instance_mut()) {
                instance.record_real_id(Value::Int(key));
            }
            Ok(())
        });
        Ok(def
            .hide_field(PHANTOM_ID)
            .push_layer("withPhantomId", hooks))
    }
}
