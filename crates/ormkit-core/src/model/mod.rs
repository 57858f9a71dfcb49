//! Model composition and runtime.
//!
//! A model starts as a named base and is wrapped by capability layers
//! (mixins) through a [`ModelBuilder`]. Finalising stores the resulting
//! [`Model`] in a [`ModelRegistry`] under its name. Instances of the model
//! carry a record and go through the `New -> Persisted -> Removed` lifecycle,
//! firing hooks on every layer along the way.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use ormkit_core::datasource::{Datasource, MemoryDatasource, TableDef};
//! use ormkit_core::model::{ModelBuilder, ModelRegistry};
//! use ormkit_core::record;
//! use ormkit_core::schema::types;
//!
//! # futures::executor::block_on(async {
//! let ds = Arc::new(MemoryDatasource::new());
//! let schema = types::schema([
//!     ("id", types::uuid().default_with(|| uuid::Uuid::new_v4().into())),
//!     ("title", types::string().required()),
//! ]);
//! ds.create_table(&TableDef::for_schema("Post", &schema.clone().into_schema().unwrap()))
//!     .await
//!     .unwrap();
//!
//! let post = ModelBuilder::new("Post")
//!     .with_datasource(ds)
//!     .with_schema(schema)
//!     .finalise_in(&ModelRegistry::new())
//!     .unwrap();
//!
//! let saved = post.build(record! { "title" => "hello" }).await.unwrap();
//! assert!(saved.id().is_some());
//! assert_eq!(post.count(record! {}).await.unwrap(), 1);
//! # });
//! ```

mod builder;
mod hooks;
mod instance;
pub mod mixins;
mod registry;
mod runtime;

pub use builder::{Mixin, ModelBuilder, ModelDef, BASE_LAYER};
pub use hooks::{Hook, HookContext, HookKind, HookSet, Layer};
pub use instance::{Instance, InstanceOptions, InstanceState};
pub use mixins::{
    ExtendSchema, PhantomIdOptions, WithDatasource, WithPhantomId, WithSchema, WithTimestamps,
};
pub use registry::ModelRegistry;
pub use runtime::{Hydrated, Model, TableHandle, TxScope};
