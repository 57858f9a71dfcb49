//! Sequencing migrations against the applied log.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use super::error::{Direction, MigrationError};
use super::step::MigrationStep;
use crate::datasource::Datasource;
use crate::error::Result;

/// The most recently applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Version {
    /// Nothing applied.
    None,
    /// Name of the last applied migration.
    Applied(String),
}

impl Version {
    /// Check if nothing is applied.
    pub fn is_none(&self) -> bool {
        matches!(self, Version::None)
    }

    /// The applied name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Version::None => None,
            Version::Applied(name) => Some(name),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::None => write!(f, "none"),
            Version::Applied(name) => write!(f, "{}", name),
        }
    }
}

/// Applied and pending migrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Applied names, in application order.
    pub applied: Vec<String>,
    /// Pending names, in the order `latest` would apply them.
    pub pending: Vec<String>,
}

/// Applies and reverts named migrations in name order.
///
/// The datasource keeps the log of applied names; the controller only holds
/// the catalogue of steps.
pub struct MigrationController {
    datasource: Arc<dyn Datasource>,
    steps: Vec<Arc<dyn MigrationStep>>,
}

impl MigrationController {
    /// Create a controller over `migrations`.
    pub fn new<M>(datasource: Arc<dyn Datasource>, migrations: impl IntoIterator<Item = M>) -> Self
    where
        M: MigrationStep + 'static,
    {
        let controller = Self {
            datasource,
            steps: Vec::new(),
        };
        migrations
            .into_iter()
            .fold(controller, |controller, step| controller.with_step(step))
    }

    /// Add a step, replacing any step with the same name.
    pub fn with_step(mut self, step: impl MigrationStep + 'static) -> Self {
        self.steps.retain(|s| s.name() != step.name());
        self.steps.push(Arc::new(step));
        self.steps.sort_by(|a, b| a.name().cmp(b.name()));
        self
    }

    /// Catalogue names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    fn step(&self, name: &str) -> Result<&Arc<dyn MigrationStep>> {
        self.steps
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| {
                MigrationError::UnknownMigration {
                    name: name.to_string(),
                }
                .into()
            })
    }

    async fn pending(&self) -> Result<Vec<Arc<dyn MigrationStep>>> {
        let applied = self.datasource.applied_migrations().await?;
        Ok(self
            .steps
            .iter()
            .filter(|s| !applied.iter().any(|a| a == s.name()))
            .cloned()
            .collect())
    }

    async fn run_step(&self, step: &dyn MigrationStep, direction: Direction) -> Result<()> {
        let outcome = match direction {
            Direction::Up => step.up(self.datasource.clone()).await,
            Direction::Down => step.down(self.datasource.clone()).await,
        };
        outcome.map_err(|source| MigrationError::StepFailed {
            name: step.name().to_string(),
            direction,
            source: Box::new(source),
        })?;

        match direction {
            Direction::Up => self.datasource.record_migration(step.name()).await?,
            Direction::Down => self.datasource.remove_migration(step.name()).await?,
        }
        info!(migration = %step.name(), %direction, "migration complete");
        Ok(())
    }

    /// Apply the next pending migration. Returns its name, or `None` when
    /// everything is applied.
    #[instrument(skip(self))]
    pub async fn up(&self) -> Result<Option<String>> {
        let Some(step) = self.pending().await?.into_iter().next() else {
            return Ok(None);
        };
        self.run_step(step.as_ref(), Direction::Up).await?;
        Ok(Some(step.name().to_string()))
    }

    /// Revert the most recently applied migration. Returns its name, or
    /// `None` when nothing is applied.
    #[instrument(skip(self))]
    pub async fn down(&self) -> Result<Option<String>> {
        let applied = self.datasource.applied_migrations().await?;
        let Some(name) = applied.last() else {
            return Ok(None);
        };
        let step = self.step(name)?;
        self.run_step(step.as_ref(), Direction::Down).await?;
        Ok(Some(name.clone()))
    }

    /// Apply every pending migration in order, stopping at the first failure.
    ///
    /// Migrations applied before a failure stay applied.
    #[instrument(skip(self))]
    pub async fn latest(&self) -> Result<Vec<String>> {
        let mut applied = Vec::new();
        for step in self.pending().await? {
            self.run_step(step.as_ref(), Direction::Up).await?;
            applied.push(step.name().to_string());
        }
        Ok(applied)
    }

    /// Revert every applied migration, most recent first.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<Vec<String>> {
        let applied = self.datasource.applied_migrations().await?;
        let mut reverted = Vec::with_capacity(applied.len());
        for name in applied.iter().rev() {
            let step = self.step(name)?;
            self.run_step(step.as_ref(), Direction::Down).await?;
            reverted.push(name.clone());
        }
        Ok(reverted)
    }

    /// The most recently applied migration.
    pub async fn version(&self) -> Result<Version> {
        let applied = self.datasource.applied_migrations().await?;
        Ok(match applied.last() {
            Some(name) => Version::Applied(name.clone()),
            None => Version::None,
        })
    }

    /// Applied and pending migrations.
    pub async fn status(&self) -> Result<MigrationStatus> {
        let applied = self.datasource.applied_migrations().await?;
        let pending = self
            .steps
            .iter()
            .map(|s| s.name().to_string())
            .filter(|name| !applied.contains(name))
            .collect();
        Ok(MigrationStatus { applied, pending })
    }
}

impl std::fmt::Debug for MigrationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationController")
            .field("steps", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{MemoryDatasource, TableDef};
    use crate::error::Error;
    use crate::migration::Migration;

    fn table_step(name: &str, table: &'static str) -> Migration {
        Migration::new(
            name,
            move |ds| async move {
                ds.create_table(&TableDef::new(table).uuid("id")).await?;
                Ok::<_, Error>(())
            },
            move |ds| async move {
                ds.drop_table(table).await?;
                Ok::<_, Error>(())
            },
        )
    }

    fn controller(ds: &Arc<MemoryDatasource>) -> MigrationController {
        MigrationController::new(
            ds.clone(),
            vec![
                table_step("3-three", "three"),
                table_step("1-one", "one"),
                table_step("2-two", "two"),
            ],
        )
    }

    #[test]
    fn test_catalogue_is_sorted() {
        let ds = Arc::new(MemoryDatasource::new());
        assert_eq!(controller(&ds).names(), vec!["1-one", "2-two", "3-three"]);
    }

    #[tokio::test]
    async fn test_up_and_down_walk_versions() {
        let ds = Arc::new(MemoryDatasource::new());
        let controller = controller(&ds);
        assert_eq!(controller.version().await.unwrap(), Version::None);

        for expected in ["1-one", "2-two", "3-three"] {
            assert_eq!(controller.up().await.unwrap().as_deref(), Some(expected));
            assert_eq!(controller.version().await.unwrap().to_string(), expected);
        }
        assert_eq!(controller.up().await.unwrap(), None);
        assert!(ds.has_table("three").await.unwrap());

        for expected in ["2-two", "1-one", "none"] {
            controller.down().await.unwrap();
            assert_eq!(controller.version().await.unwrap().to_string(), expected);
        }
        assert_eq!(controller.down().await.unwrap(), None);
        assert!(!ds.has_table("one").await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_and_reset() {
        let ds = Arc::new(MemoryDatasource::new());
        let controller = controller(&ds);

        let applied = controller.latest().await.unwrap();
        assert_eq!(applied, vec!["1-one", "2-two", "3-three"]);
        assert_eq!(controller.latest().await.unwrap(), Vec::<String>::new());

        let reverted = controller.reset().await.unwrap();
        assert_eq!(reverted, vec!["3-three", "2-two", "1-one"]);
        assert!(controller.version().await.unwrap().is_none());
        assert!(ds.table_names().is_empty());
    }

    #[tokio::test]
    async fn test_latest_halts_at_failure() {
        let ds = Arc::new(MemoryDatasource::new());
        let failing = Migration::new(
            "2-broken",
            |_| async { Err(Error::hook("broken")) },
            |_| async { Ok(()) },
        );
        let controller = controller(&ds).with_step(failing);

        let err = controller.latest().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Migration(MigrationError::StepFailed { ref name, direction: Direction::Up, .. })
                if name == "2-broken"
        ));

        let status = controller.status().await.unwrap();
        assert_eq!(status.applied, vec!["1-one"]);
        assert_eq!(status.pending, vec!["2-broken", "2-two", "3-three"]);
    }

    #[tokio::test]
    async fn test_down_unknown_migration() {
        let ds = Arc::new(MemoryDatasource::new());
        ds.record_migration("0-ghost").await.unwrap();
        let err = controller(&ds).down().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Migration(MigrationError::UnknownMigration { ref name }) if name == "0-ghost"
        ));
    }
}
