//! Model instances and their persistence lifecycle.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};
use tracing::debug;

use super::hooks::{HookContext, HookKind};
use super::mixins::{ID, PHANTOM_ID};
use super::runtime::{rollback_quietly, Model};
use crate::codec;
use crate::datasource::{Query, Transaction};
use crate::error::{Error, Result};
use crate::value::{Record, Value};

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Never saved; the next save inserts.
    New,
    /// Backed by a row; the next save updates it.
    Persisted,
    /// Deleted. Terminal.
    Removed,
}

/// Options for constructing an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceOptions {
    /// Treat the data as unsaved.
    pub new_instance: bool,
    /// Validate against the schema before every write.
    pub validate: bool,
}

impl InstanceOptions {
    /// Options for rows loaded from storage.
    pub fn persisted() -> Self {
        Self {
            new_instance: false,
            validate: true,
        }
    }

    /// Toggle validation.
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            new_instance: true,
            validate: true,
        }
    }
}

/// A record bound to a model.
///
/// Fields are reached through [`get`](Self::get) and [`set`](Self::set). The
/// accessible fields are the keys the instance was constructed with plus the
/// keys of the model's schema, minus hidden fields. The primary `id` can be
/// given at construction or filled by a schema default, but never written
/// afterwards.
pub struct Instance {
    model: Arc<Model>,
    data: Record,
    orig_data: Record,
    fields: BTreeSet<String>,
    state: InstanceState,
    validate: bool,
}

impl Instance {
    pub(crate) fn new(model: Arc<Model>, data: Record, opts: InstanceOptions) -> Self {
        let orig_data = data.clone();

        let mut fields: BTreeSet<String> = data.keys().cloned().collect();
        if let Some(schema) = model.schema() {
            fields.extend(schema.keys().map(str::to_string));
        }

        let hidden = model.hidden_fields();
        fields.retain(|f| !hidden.contains(f));
        let mut data = data;
        data.retain(|k, _| !hidden.contains(k));

        let state = if opts.new_instance {
            InstanceState::New
        } else {
            InstanceState::Persisted
        };

        Self {
            model,
            data,
            orig_data,
            fields,
            state,
            validate: opts.validate,
        }
    }

    /// The model this instance belongs to.
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Lifecycle state.
    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Check if the instance has never been saved.
    pub fn is_new(&self) -> bool {
        self.state == InstanceState::New
    }

    /// Check if the instance validates before writes.
    pub fn validates(&self) -> bool {
        self.validate
    }

    /// Accessible field names, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Check if a field is accessible.
    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains(key)
    }

    /// Read a field. `None` means undefined.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// The primary identifier.
    pub fn id(&self) -> Option<&Value> {
        self.data.get(ID).filter(|v| !v.is_null())
    }

    /// The hidden surrogate key, read from the construction snapshot.
    pub fn real_id(&self) -> Option<&Value> {
        self.orig_data.get(PHANTOM_ID)
    }

    /// The record as it was right after construction, before defaults.
    pub fn orig_data(&self) -> &Record {
        &self.orig_data
    }

    /// Read-only view of the live record.
    pub fn values(&self) -> &Record {
        &self.data
    }

    /// A copy of the live record.
    pub fn snapshot(&self) -> Record {
        self.data.clone()
    }

    /// The live record as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Write a field.
    ///
    /// Fails with [`Error::ImmutableId`] for `id`. On a model with a schema,
    /// writing a key that is not accessible fails with
    /// [`Error::UnknownField`]; schemaless models accept any new key.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_writable(key)?;
        self.data.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Clear a field back to undefined.
    pub fn unset(&mut self, key: &str) -> Result<Option<Value>> {
        self.ensure_writable(key)?;
        Ok(self.data.remove(key))
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if key == ID {
            return Err(Error::ImmutableId);
        }
        let known = self.fields.contains(key);
        if !known && (self.model.schema().is_some() || self.model.is_hidden(key)) {
            return Err(Error::UnknownField(key.to_string()));
        }
        Ok(())
    }

    fn ensure_writable(&mut self, key: &str) -> Result<()> {
        self.check_writable(key)?;
        if !self.fields.contains(key) {
            self.fields.insert(key.to_string());
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state {
            InstanceState::Removed => Err(Error::InstanceRemoved {
                model: self.model.name().to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn require_id(&self) -> Result<Value> {
        self.id().cloned().ok_or_else(|| Error::MissingId {
            model: self.model.name().to_string(),
        })
    }

    /// Merge validated values into the live record. An existing `id` and
    /// hidden fields are left alone.
    pub(crate) fn apply_validated(&mut self, validated: Record) {
        for (key, value) in validated {
            if self.model.is_hidden(&key) || (key == ID && self.id().is_some()) {
                continue;
            }
            self.fields.insert(key.clone());
            self.data.insert(key, value);
        }
    }

    /// Record a storage-generated surrogate key in the snapshot.
    pub(crate) fn record_real_id(&mut self, key: Value) {
        self.orig_data
            .entry(PHANTOM_ID.to_string())
            .or_insert(key);
    }

    /// Insert or update the backing row.
    ///
    /// Runs `beforeCreate`/`beforeUpdate` (which validate when a schema is
    /// bound), transforms the record, runs the statement wrapped in
    /// `beforeQuery`/`afterQuery`, then `afterCreate`/`afterUpdate`.
    pub async fn save(&mut self) -> Result<()> {
        self.ensure_live()?;
        let model = self.model.clone();
        model.require_datasource()?;

        let is_new = self.is_new();
        let (before, after) = if is_new {
            (HookKind::BeforeCreate, HookKind::AfterCreate)
        } else {
            (HookKind::BeforeUpdate, HookKind::AfterUpdate)
        };

        model
            .dispatch(before, &mut HookContext::for_instance(&model, self))
            .await?;

        let stored = codec::transform(model.schema(), &self.data)?;
        let query = if is_new {
            Query::table(model.table()).insert(stored)
        } else {
            Query::table(model.table())
                .where_eq(ID, self.require_id()?)
                .update(stored)
        };

        let mut ctx = HookContext::for_instance(&model, self).with_query(query);
        model.run_hooked(&mut ctx, None).await?;
        model.dispatch(after, &mut ctx).await?;
        drop(ctx);

        if is_new {
            self.state = InstanceState::Persisted;
        }
        debug!(model = %model.name(), created = is_new, "saved instance");
        Ok(())
    }

    /// Shallow-merge `partial` into the record, then save.
    ///
    /// Every key is checked before any is merged: a partial whose `id`
    /// differs from the current one fails with [`Error::ImmutableId`], and an
    /// inaccessible key with [`Error::UnknownField`], leaving the record as
    /// it was.
    pub async fn update(&mut self, partial: Record) -> Result<()> {
        self.ensure_live()?;
        for (key, value) in &partial {
            if key == ID {
                if self.id() != Some(value) {
                    return Err(Error::ImmutableId);
                }
            } else {
                self.check_writable(key)?;
            }
        }
        for (key, value) in partial {
            if key != ID {
                self.ensure_writable(&key)?;
                self.data.insert(key, value);
            }
        }
        self.save().await
    }

    /// Delete the backing row.
    ///
    /// Runs `beforeRemove`, then inside a transaction the delete (wrapped in
    /// `beforeQuery`/`afterQuery`) and `afterRemove`. Any failure rolls the
    /// transaction back and is returned.
    pub async fn remove(&mut self) -> Result<()> {
        self.ensure_live()?;
        let model = self.model.clone();
        let datasource = model.require_datasource()?.clone();

        model
            .dispatch(HookKind::BeforeRemove, &mut HookContext::for_instance(&model, self))
            .await?;

        let id = self.require_id()?;
        let transaction = datasource.begin().await?;

        match self.remove_in(&model, transaction.as_ref(), id).await {
            Ok(()) => {
                transaction.commit().await?;
                self.state = InstanceState::Removed;
                debug!(model = %model.name(), "removed instance");
                Ok(())
            }
            Err(err) => {
                rollback_quietly(transaction.as_ref(), model.name()).await;
                Err(err)
            }
        }
    }

    async fn remove_in(&mut self, model: &Model, transaction: &dyn Transaction, id: Value) -> Result<()> {
        let query = Query::table(model.table()).where_eq(ID, id).delete();
        let mut ctx = HookContext::for_instance(model, self).with_query(query);
        model.run_hooked(&mut ctx, Some(transaction)).await?;
        model.dispatch(HookKind::AfterRemove, &mut ctx).await
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("model", &self.model.name())
            .field("state", &self.state)
            .field("data", &self.data)
            .finish()
    }
}

impl Serialize for Instance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelBuilder, ModelRegistry};
    use crate::record;
    use crate::schema::types;

    fn schemaless() -> Arc<Model> {
        ModelBuilder::new("Loose").finalise_in(&ModelRegistry::new()).unwrap()
    }

    fn with_schema() -> Arc<Model> {
        ModelBuilder::new("Strict")
            .with_schema(types::schema([("id", types::uuid()), ("foo", types::string())]))
            .finalise_in(&ModelRegistry::new())
            .unwrap()
    }

    #[test]
    fn test_id_is_immutable() {
        let model = schemaless();
        let mut instance = model
            .instantiate(record! { "id" => "abc" }, InstanceOptions::default())
            .unwrap();

        let err = instance.set("id", "other").unwrap_err();
        assert!(matches!(err, Error::ImmutableId));
        assert!(matches!(instance.unset("id"), Err(Error::ImmutableId)));
        assert_eq!(instance.id(), Some(&Value::from("abc")));
    }

    #[test]
    fn test_accessors_cover_data_and_schema() {
        let model = with_schema();
        let instance = model
            .instantiate(record! { "foo" => "x" }, InstanceOptions::default())
            .unwrap();
        assert_eq!(instance.fields().collect::<Vec<_>>(), vec!["foo", "id"]);
        assert!(instance.get("id").is_none());
    }

    #[test]
    fn test_set_unknown_field() {
        let model = with_schema();
        let mut strict = model.instantiate(record! {}, InstanceOptions::default()).unwrap();
        assert!(matches!(strict.set("nope", 1), Err(Error::UnknownField(_))));
        strict.set("foo", "ok").unwrap();
        assert_eq!(strict.get("foo"), Some(&Value::from("ok")));

        let model = schemaless();
        let mut loose = model.instantiate(record! {}, InstanceOptions::default()).unwrap();
        loose.set("anything", 1).unwrap();
        assert!(loose.has_field("anything"));
        assert_eq!(loose.unset("anything").unwrap(), Some(Value::Int(1)));
        assert!(loose.get("anything").is_none());
    }

    #[test]
    fn test_construction_rejects_undeclared_keys() {
        let err = with_schema()
            .instantiate(record! { "nope" => 1 }, InstanceOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidField { .. }));
    }

    #[test]
    fn test_serialize_and_snapshot() {
        let model = schemaless();
        let mut instance = model
            .instantiate(record! { "a" => 1 }, InstanceOptions::default())
            .unwrap();
        instance.set("b", "two").unwrap();

        assert_eq!(instance.to_json(), serde_json::json!({"a": 1, "b": "two"}));
        assert_eq!(
            serde_json::to_value(&instance).unwrap(),
            serde_json::json!({"a": 1, "b": "two"})
        );
        assert_eq!(instance.orig_data(), &record! { "a" => 1 });
        assert_eq!(instance.snapshot().len(), 2);
    }

    #[test]
    fn test_instance_options() {
        let model = schemaless();
        let persisted = model
            .instantiate(record! {}, InstanceOptions::persisted().validate(false))
            .unwrap();
        assert_eq!(persisted.state(), InstanceState::Persisted);
        assert!(!persisted.validates());
    }

    #[tokio::test]
    async fn test_save_without_datasource() {
        let model = schemaless();
        let mut instance = model.instantiate(record! {}, InstanceOptions::default()).unwrap();
        assert!(instance.save().await.is_err());
        assert!(instance.is_new());
    }
}
