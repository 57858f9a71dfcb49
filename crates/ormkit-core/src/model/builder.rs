//! Fluent model composition.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::hooks::{HookSet, Layer};
use super::mixins::{
    ExtendSchema, PhantomIdOptions, WithDatasource, WithPhantomId, WithSchema, WithTimestamps,
};
use super::registry::ModelRegistry;
use super::runtime::Model;
use crate::datasource::Datasource;
use crate::error::Result;
use crate::schema::{FieldType, Schema};
use crate::value::Value;

/// Name of the layer every model starts from.
pub const BASE_LAYER: &str = "base";

/// A model under construction.
///
/// Mixins receive the definition by value and return an extended one. The
/// name is fixed at creation; every other part can be replaced.
#[derive(Clone)]
pub struct ModelDef {
    name: String,
    pub(crate) table: Option<String>,
    pub(crate) schema: Option<Schema>,
    pub(crate) datasource: Option<Arc<dyn Datasource>>,
    pub(crate) layers: Vec<Layer>,
    pub(crate) hidden: BTreeSet<String>,
    pub(crate) properties: BTreeMap<String, Value>,
}

impl ModelDef {
    /// Create a definition with a base layer owning `hooks`.
    pub fn new(name: impl Into<String>, hooks: HookSet) -> Self {
        Self {
            name: name.into(),
            table: None,
            schema: None,
            datasource: None,
            layers: vec![Layer::new(BASE_LAYER, hooks)],
            hidden: BTreeSet::new(),
            properties: BTreeMap::new(),
        }
    }

    /// The model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bound schema, if any.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// The bound datasource, if any.
    pub fn datasource(&self) -> Option<&Arc<dyn Datasource>> {
        self.datasource.as_ref()
    }

    /// The storage table, if bound.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Names of applied layers, base first.
    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }

    /// Bind a datasource and table.
    pub fn bind_datasource(mut self, datasource: Arc<dyn Datasource>, table: impl Into<String>) -> Self {
        self.datasource = Some(datasource);
        self.table = Some(table.into());
        self
    }

    /// Replace the bound schema.
    pub fn bind_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Hide a field from accessors and the live record.
    pub fn hide_field(mut self, field: impl Into<String>) -> Self {
        self.hidden.insert(field.into());
        self
    }

    /// Push an outer layer.
    pub fn push_layer(mut self, name: impl Into<String>, hooks: HookSet) -> Self {
        self.layers.push(Layer::new(name, hooks));
        self
    }

    /// Attach a static property, readable as [`Model::property`].
    pub fn set_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("layers", &self.layers)
            .field("has_datasource", &self.datasource.is_some())
            .finish()
    }
}

/// A capability layer applied to a [`ModelDef`].
///
/// Any `FnOnce(ModelDef) -> Result<ModelDef>` is a mixin; arguments are
/// captured by the closure.
pub trait Mixin {
    /// Wrap the definition.
    fn apply(self, def: ModelDef) -> Result<ModelDef>;
}

impl<F> Mixin for F
where
    F: FnOnce(ModelDef) -> Result<ModelDef>,
{
    fn apply(self, def: ModelDef) -> Result<ModelDef> {
        self(def)
    }
}

/// Fluent builder threading a [`ModelDef`] through mixins.
///
/// Errors are deferred: the first failing step is remembered, later steps are
/// skipped, and the error surfaces from [`finalise`](Self::finalise).
///
/// ```
/// use ormkit_core::model::{ModelBuilder, ModelRegistry};
/// use ormkit_core::schema::types;
///
/// let registry = ModelRegistry::new();
/// let model = ModelBuilder::new("Note")
///     .with_schema(types::schema([("id", types::uuid()), ("body", types::string())]))
///     .with_timestamps()
///     .finalise_in(&registry)
///     .unwrap();
///
/// assert_eq!(model.name(), "Note");
/// assert!(model.schema().unwrap().contains("createdOn"));
/// assert!(registry.contains("Note"));
/// ```
#[must_use]
pub struct ModelBuilder {
    state: Result<ModelDef>,
}

impl ModelBuilder {
    /// Start from a named base with no hooks.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_hooks(name, HookSet::new())
    }

    /// Start from a named base that owns `hooks`.
    pub fn with_hooks(name: impl Into<String>, hooks: HookSet) -> Self {
        Self {
            state: Ok(ModelDef::new(name, hooks)),
        }
    }

    /// Apply a mixin.
    pub fn use_mixin(self, mixin: impl Mixin) -> Self {
        Self {
            state: self.state.and_then(|def| mixin.apply(def)),
        }
    }

    /// Bind a datasource; the table is the model name.
    pub fn with_datasource(self, datasource: Arc<dyn Datasource>) -> Self {
        self.use_mixin(WithDatasource::new(datasource))
    }

    /// Bind a datasource and an explicit table.
    pub fn with_datasource_table(self, datasource: Arc<dyn Datasource>, table: impl Into<String>) -> Self {
        self.use_mixin(WithDatasource::new(datasource).table(table))
    }

    /// Bind a schema. `schema` must be an object type with declared keys.
    pub fn with_schema(self, schema: FieldType) -> Self {
        self.use_mixin(WithSchema::new(schema))
    }

    /// Add or replace schema fields.
    pub fn extend_schema<K: Into<String>>(self, fields: impl IntoIterator<Item = (K, FieldType)>) -> Self {
        self.use_mixin(ExtendSchema::new(fields))
    }

    /// Add `createdOn`/`updatedOn` maintenance.
    pub fn with_timestamps(self) -> Self {
        self.use_mixin(WithTimestamps)
    }

    /// Hide a numeric surrogate key behind a public UUID.
    pub fn with_phantom_id(self) -> Self {
        self.with_phantom_id_options(PhantomIdOptions::default())
    }

    /// Hide a surrogate key behind a public id, with custom field types.
    pub fn with_phantom_id_options(self, options: PhantomIdOptions) -> Self {
        self.use_mixin(WithPhantomId::new(options))
    }

    /// Push a layer owning `hooks`.
    pub fn hooks(self, hooks: HookSet) -> Self {
        self.use_mixin(move |def: ModelDef| -> Result<ModelDef> {
            Ok(def.push_layer("hooks", hooks))
        })
    }

    /// Register the model in the process-wide registry.
    pub fn finalise(self) -> Result<Arc<Model>> {
        self.finalise_in(ModelRegistry::global())
    }

    /// Register the model in `registry`.
    pub fn finalise_in(self, registry: &ModelRegistry) -> Result<Arc<Model>> {
        let model = Arc::new(Model::from_def(self.state?));
        registry.register(model.clone());
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, Error};
    use crate::schema::types;

    #[test]
    fn test_name_survives_layers() {
        let registry = ModelRegistry::new();
        let model = ModelBuilder::new("Named")
            .use_mixin(|def: ModelDef| -> Result<ModelDef> { Ok(def.set_property("x", 1)) })
            .with_schema(types::schema([("id", types::uuid())]))
            .finalise_in(&registry)
            .unwrap();
        assert_eq!(model.name(), "Named");
        assert_eq!(model.property("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_errors_are_deferred() {
        let registry = ModelRegistry::new();
        let builder = ModelBuilder::new("Broken")
            .extend_schema([("a", types::string())])
            .with_schema(types::string());
        let err = builder.finalise_in(&registry).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::NoSchemaToExtend { ref model }) if model == "Broken"
        ));
        assert!(!registry.contains("Broken"));
    }

    #[test]
    fn test_capabilities_in_order() {
        let registry = ModelRegistry::new();
        let model = ModelBuilder::new("Layered")
            .with_schema(types::schema([("id", types::uuid())]))
            .with_timestamps()
            .hooks(HookSet::new())
            .finalise_in(&registry)
            .unwrap();
        assert_eq!(
            model.capabilities(),
            vec![BASE_LAYER, "withSchema", "extendSchema", "withTimestamps", "hooks"]
        );
    }
}
