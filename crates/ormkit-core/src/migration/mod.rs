//! Ordered, reversible migrations.
//!
//! A [`MigrationController`] holds a catalogue of [`MigrationStep`]s sorted by
//! name and moves the datasource's applied log forwards (`up`, `latest`) or
//! backwards (`down`, `reset`). The current [`Version`] is the last applied
//! name.

mod controller;
mod error;
mod step;

pub use controller::{MigrationController, MigrationStatus, Version};
pub use error::{Direction, MigrationError};
pub use step::{Migration, MigrationStep};
