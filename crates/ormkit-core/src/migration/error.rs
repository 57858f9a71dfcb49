//! Migration errors.

use thiserror::Error;

/// Direction a migration step runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply.
    Up,
    /// Revert.
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Migration sequencing errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The applied log names a migration the controller does not know.
    #[error("unknown migration '{name}'")]
    UnknownMigration {
        /// Name from the applied log.
        name: String,
    },

    /// A step's action failed. Steps applied before it stay applied.
    #[error("migration '{name}' failed ({direction}): {source}")]
    StepFailed {
        /// Migration name.
        name: String,
        /// Which action failed.
        direction: Direction,
        /// The underlying error.
        #[source]
        source: Box<crate::error::Error>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_messages() {
        let err = MigrationError::UnknownMigration { name: "9-gone".into() };
        assert_eq!(err.to_string(), "unknown migration '9-gone'");

        let err = MigrationError::StepFailed {
            name: "1-one".into(),
            direction: Direction::Down,
            source: Box::new(Error::hook("boom")),
        };
        assert_eq!(err.to_string(), "migration '1-one' failed (down): hook failed: boom");
    }
}
