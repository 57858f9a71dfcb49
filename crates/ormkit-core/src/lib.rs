//! ormkit core - composable models, schema validation and migrations.
//!
//! Models are built by layering capabilities onto a named base (see
//! [`model::ModelBuilder`]), validated against a [`schema::Schema`], and
//! persisted through any [`datasource::Datasource`]. The
//! [`migration::MigrationController`] sequences schema changes against the
//! same datasource.

pub mod codec;
pub mod datasource;
pub mod error;
pub mod migration;
pub mod model;
pub mod schema;
pub mod value;

pub use codec::{transform, untransform};
pub use datasource::{
    ColumnDef, ColumnKind, Datasource, DatasourceError, MemoryDatasource, Query, QueryOp,
    QueryOutput, TableDef, Transaction,
};
pub use error::{ConfigError, Error, Result};
pub use migration::{
    Migration, MigrationController, MigrationError, MigrationStatus, MigrationStep, Version,
};
pub use model::{
    Hook, HookContext, HookKind, HookSet, Hydrated, Instance, InstanceOptions, InstanceState,
    Mixin, Model, ModelBuilder, ModelDef, ModelRegistry, PhantomIdOptions,
};
pub use schema::{types, FieldKind, FieldType, Schema, ValidateOptions, ValidationError};
pub use value::{Record, Value};
