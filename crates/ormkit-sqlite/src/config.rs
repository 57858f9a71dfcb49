//! Connection configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default name of the table that logs applied migrations.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "ormkit_migrations";

/// SQLite datasource configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,

    /// How long a statement waits on a locked database.
    pub busy_timeout: Duration,

    /// Enforce foreign key constraints.
    pub foreign_keys: bool,

    /// Table holding the applied migration log.
    pub migrations_table: String,
}

impl SqliteConfig {
    /// Configuration for a database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::in_memory()
        }
    }

    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            foreign_keys: true,
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
        }
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enable or disable foreign key enforcement.
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the migration log table.
    pub fn with_migrations_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    /// Check if the database lives only in memory.
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}
