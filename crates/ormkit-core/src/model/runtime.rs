//! Finalised models: finders, hydration and hook dispatch.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::{debug, trace, warn};

use super::builder::ModelDef;
use super::hooks::{HookContext, HookKind, Layer};
use super::instance::{Instance, InstanceOptions};
use super::mixins::ID;
use crate::codec;
use crate::datasource::{Datasource, Query, QueryOutput, Transaction};
use crate::error::{ConfigError, Error, Result};
use crate::schema::Schema;
use crate::value::{Record, Value};

/// A finalised model type.
///
/// Models are shared as `Arc<Model>`; instances keep a handle to the model
/// that created them.
pub struct Model {
    name: String,
    table: String,
    schema: Option<Schema>,
    datasource: Option<Arc<dyn Datasource>>,
    layers: Vec<Layer>,
    hidden: BTreeSet<String>,
    properties: BTreeMap<String, Value>,
}

/// Rows returned by [`Model::query_builder`], rehydrated.
#[derive(Debug)]
pub enum Hydrated {
    /// The statement returned no row.
    Nothing,
    /// A single row.
    One(Instance),
    /// A list of rows.
    Many(Vec<Instance>),
    /// The statement did not return rows (count, insert, update, delete).
    Raw(QueryOutput),
}

impl Hydrated {
    /// Take the instances, treating a single instance as a one-element list.
    pub fn into_vec(self) -> Vec<Instance> {
        match self {
            Hydrated::One(instance) => vec![instance],
            Hydrated::Many(instances) => instances,
            Hydrated::Nothing | Hydrated::Raw(_) => Vec::new(),
        }
    }
}

/// The raw table a model stores its rows in.
#[derive(Clone)]
pub struct TableHandle {
    datasource: Arc<dyn Datasource>,
    table: String,
}

impl TableHandle {
    /// A select over every row of the table.
    pub fn query(&self) -> Query {
        Query::table(self.table.clone())
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.table
    }

    /// Run a statement.
    pub async fn run(&self, query: Query) -> Result<QueryOutput> {
        Ok(self.datasource.run(&query).await?)
    }
}

/// A transaction scoped to a model's table.
#[derive(Clone)]
pub struct TxScope {
    transaction: Arc<dyn Transaction>,
    table: String,
}

impl TxScope {
    /// A select over every row of the table.
    pub fn query(&self) -> Query {
        Query::table(self.table.clone())
    }

    /// Run a statement inside the transaction.
    pub async fn run(&self, query: Query) -> Result<QueryOutput> {
        Ok(self.transaction.run(&query).await?)
    }
}

impl Model {
    pub(crate) fn from_def(def: ModelDef) -> Self {
        let name = def.name().to_string();
        let table = def.table.unwrap_or_else(|| name.clone());
        Self {
            name,
            table,
            schema: def.schema,
            datasource: def.datasource,
            layers: def.layers,
            hidden: def.hidden,
            properties: def.properties,
        }
    }

    /// The model name, also its registry key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The storage table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The bound schema, if any.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// The bound datasource, if any.
    pub fn datasource(&self) -> Option<&Arc<dyn Datasource>> {
        self.datasource.as_ref()
    }

    /// Names of applied layers, base first.
    pub fn capabilities(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }

    /// A static property attached by a mixin.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Check if a field is hidden from accessors.
    pub fn is_hidden(&self, field: &str) -> bool {
        self.hidden.contains(field)
    }

    pub(crate) fn hidden_fields(&self) -> &BTreeSet<String> {
        &self.hidden
    }

    pub(crate) fn require_datasource(&self) -> Result<&Arc<dyn Datasource>> {
        self.datasource.as_ref().ok_or_else(|| {
            ConfigError::NoDatasource {
                model: self.name.clone(),
            }
            .into()
        })
    }

    /// Fire a hook on every layer, outermost first.
    pub(crate) async fn dispatch(&self, kind: HookKind, ctx: &mut HookContext<'_>) -> Result<()> {
        for layer in self.layers.iter().rev() {
            if let Some(hook) = layer.hooks.slot(kind) {
                trace!(model = %self.name, layer = %layer.name, hook = %kind, "dispatching hook");
                hook.call(ctx).await?;
            }
        }
        Ok(())
    }

    /// Run `ctx.query` wrapped in `beforeQuery`/`afterQuery`, directly or
    /// inside `transaction`.
    pub(crate) async fn run_hooked(
        &self,
        ctx: &mut HookContext<'_>,
        transaction: Option<&dyn Transaction>,
    ) -> Result<QueryOutput> {
        self.dispatch(HookKind::BeforeQuery, ctx).await?;

        let query = ctx
            .query
            .clone()
            .ok_or_else(|| Error::hook("beforeQuery removed the pending statement"))?;
        debug!(model = %self.name, table = %query.table, op = ?query.op, "running statement");

        let outcome = match transaction {
            Some(tx) => tx.run(&query).await?,
            None => self.require_datasource()?.run(&query).await?,
        };
        ctx.outcome = Some(outcome);

        self.dispatch(HookKind::AfterQuery, ctx).await?;
        ctx.outcome
            .clone()
            .ok_or_else(|| Error::hook("afterQuery removed the statement outcome"))
    }

    /// Construct an instance from `data` without touching storage.
    pub fn instantiate(self: &Arc<Self>, data: Record, opts: InstanceOptions) -> Result<Instance> {
        let data = codec::untransform(self.schema(), &data)?;
        Ok(Instance::new(self.clone(), data, opts))
    }

    /// Construct and save a new instance.
    pub async fn build(self: &Arc<Self>, data: Record) -> Result<Instance> {
        self.build_with(data, InstanceOptions::default()).await
    }

    /// Construct and save an instance with explicit options.
    pub async fn build_with(self: &Arc<Self>, data: Record, opts: InstanceOptions) -> Result<Instance> {
        let mut instance = self.instantiate(data, opts)?;
        instance.save().await?;
        Ok(instance)
    }

    /// Fetch an instance by primary id.
    ///
    /// Fails with [`Error::NotFound`] when `id` is null or empty, or when no
    /// row matches.
    pub async fn id(self: &Arc<Self>, id: impl Into<Value>) -> Result<Instance> {
        let id = id.into();
        if !id.is_truthy() {
            return Err(Error::NotFound);
        }
        let filter = Record::from([(ID.to_string(), id)]);
        self.one(filter).await?.ok_or(Error::NotFound)
    }

    /// Fetch the first instance matching `filter`.
    pub async fn one(self: &Arc<Self>, filter: Record) -> Result<Option<Instance>> {
        let query = self.select(filter)?.first();
        let mut ctx = HookContext::new(self).with_query(query);
        let row = self.run_hooked(&mut ctx, None).await?.into_row();
        row.map(|row| self.instantiate(row, InstanceOptions::persisted()))
            .transpose()
    }

    /// Fetch every instance matching `filter`.
    pub async fn find(self: &Arc<Self>, filter: Record) -> Result<Vec<Instance>> {
        let query = self.select(filter)?;
        let mut ctx = HookContext::new(self).with_query(query);
        let rows = self.run_hooked(&mut ctx, None).await?.into_rows();
        rows.into_iter()
            .map(|row| self.instantiate(row, InstanceOptions::persisted()))
            .collect()
    }

    /// Fetch every instance.
    pub async fn all(self: &Arc<Self>) -> Result<Vec<Instance>> {
        self.find(Record::new()).await
    }

    /// Count rows matching `filter`.
    pub async fn count(&self, filter: Record) -> Result<u64> {
        let query = self.select(filter)?.count();
        let mut ctx = HookContext::new(self).with_query(query);
        Ok(self.run_hooked(&mut ctx, None).await?.count())
    }

    /// Update the first match of `filter`, or build a new instance.
    ///
    /// A new instance is built from `filter` merged with `data`. An existing
    /// match is updated with `data`, or returned unchanged when `data` is
    /// `None`.
    pub async fn upsert(self: &Arc<Self>, filter: Record, data: Option<Record>) -> Result<Instance> {
        match self.one(filter.clone()).await? {
            Some(mut existing) => {
                if let Some(data) = data {
                    existing.update(data).await?;
                }
                Ok(existing)
            }
            None => {
                let mut merged = filter;
                merged.extend(data.unwrap_or_default());
                self.build(merged).await
            }
        }
    }

    /// Run caller logic against the raw table and rehydrate what it returns.
    ///
    /// Rows become persisted instances that skip validation on save.
    pub async fn query_builder<F, Fut>(self: &Arc<Self>, f: F) -> Result<Hydrated>
    where
        F: FnOnce(TableHandle) -> Fut,
        Fut: Future<Output = Result<QueryOutput>>,
    {
        let handle = TableHandle {
            datasource: self.require_datasource()?.clone(),
            table: self.table.clone(),
        };
        let opts = InstanceOptions::persisted().validate(false);

        let hydrated = match f(handle).await? {
            QueryOutput::Row(None) => Hydrated::Nothing,
            QueryOutput::Row(Some(row)) => Hydrated::One(self.instantiate(row, opts)?),
            QueryOutput::Rows(rows) => Hydrated::Many(
                rows.into_iter()
                    .map(|row| self.instantiate(row, opts))
                    .collect::<Result<_>>()?,
            ),
            other => Hydrated::Raw(other),
        };
        Ok(hydrated)
    }

    /// Run `f` inside a transaction on the model's table.
    ///
    /// Commits when `f` succeeds; rolls back and returns the error otherwise.
    pub async fn transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(TxScope) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let transaction = self.require_datasource()?.begin().await?;
        let scope = TxScope {
            transaction: transaction.clone(),
            table: self.table.clone(),
        };

        match f(scope).await {
            Ok(value) => {
                transaction.commit().await?;
                Ok(value)
            }
            Err(err) => {
                rollback_quietly(transaction.as_ref(), &self.name).await;
                Err(err)
            }
        }
    }

    fn select(&self, filter: Record) -> Result<Query> {
        let filter = codec::transform(self.schema(), &filter)?;
        Ok(Query::table(self.table.clone()).filter(filter))
    }
}

/// Roll back after a failure, logging instead of masking the original error.
pub(crate) async fn rollback_quietly(transaction: &dyn Transaction, model: &str) {
    if let Err(err) = transaction.rollback().await {
        warn!(model = %model, error = %err, "rollback failed");
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("schema", &self.schema.as_ref().map(|s| s.keys().collect::<Vec<_>>()))
            .field("layers", &self.capabilities())
            .finish()
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Model", 1)?;
        state.serialize_field("name", &self.name)?;
        state.end()
    }
}
