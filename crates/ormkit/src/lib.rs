//! ormkit - composable models, lifecycle hooks and migrations.
//!
//! This crate bundles [`ormkit_core`] with the SQLite datasource from
//! [`ormkit_sqlite`] and adds [`cli`], the building blocks of a migration
//! command-line tool.

pub mod cli;

pub use ormkit_core::*;
pub use ormkit_sqlite::{SqliteConfig, SqliteDatasource, SqliteTransaction};
