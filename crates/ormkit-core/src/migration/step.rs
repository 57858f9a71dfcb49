//! Migration steps.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::datasource::Datasource;
use crate::error::Result;

/// A named, reversible unit of change.
///
/// Steps are ordered by name, so names usually carry a sortable prefix such
/// as `001-create-users`.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// The step's name, unique within a controller.
    fn name(&self) -> &str;

    /// Apply the change.
    async fn up(&self, datasource: Arc<dyn Datasource>) -> Result<()>;

    /// Revert the change.
    async fn down(&self, datasource: Arc<dyn Datasource>) -> Result<()>;
}

type Action = Arc<dyn Fn(Arc<dyn Datasource>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A migration step built from two closures.
///
/// ```
/// use ormkit_core::datasource::{Datasource, TableDef};
/// use ormkit_core::migration::{Migration, MigrationStep};
/// use ormkit_core::Error;
///
/// let migration = Migration::new(
///     "001-users",
///     |ds| async move {
///         ds.create_table(&TableDef::new("users").uuid("id")).await?;
///         Ok::<_, Error>(())
///     },
///     |ds| async move {
///         ds.drop_table("users").await?;
///         Ok::<_, Error>(())
///     },
/// );
/// assert_eq!(migration.name(), "001-users");
/// ```
#[derive(Clone)]
pub struct Migration {
    name: String,
    up: Action,
    down: Action,
}

impl Migration {
    /// Create a step from `up` and `down` actions.
    pub fn new<U, UF, D, DF>(name: impl Into<String>, up: U, down: D) -> Self
    where
        U: Fn(Arc<dyn Datasource>) -> UF + Send + Sync + 'static,
        UF: Future<Output = Result<()>> + Send + 'static,
        D: Fn(Arc<dyn Datasource>) -> DF + Send + Sync + 'static,
        DF: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            up: Arc::new(move |ds| up(ds).boxed()),
            down: Arc::new(move |ds| down(ds).boxed()),
        }
    }
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration").field("name", &self.name).finish()
    }
}

#[async_trait]
impl MigrationStep for Migration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, datasource: Arc<dyn Datasource>) -> Result<()> {
        (self.up)(datasource).await
    }

    async fn down(&self, datasource: Arc<dyn Datasource>) -> Result<()> {
        (self.down)(datasource).await
    }
}
