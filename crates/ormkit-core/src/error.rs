//! Core error types.

use thiserror::Error;

use crate::datasource::DatasourceError;
use crate::migration::MigrationError;
use crate::schema::ValidationError;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid model composition.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A record was rejected by the bound schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Lookup by id found nothing, or no id was given.
    #[error("unable to find resource")]
    NotFound,

    /// A record key is not declared by the bound schema.
    #[error("invalid field '{field}'")]
    InvalidField {
        /// The offending key.
        field: String,
    },

    /// An object/array column held text that is not JSON.
    #[error("invalid JSON in field '{field}': {source}")]
    InvalidJson {
        /// The offending key.
        field: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// Attempted to reassign the primary identifier.
    #[error("unable to write id")]
    ImmutableId,

    /// Write to a key that has no accessor on a schema-bound model.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// The instance has no primary identifier to address it by.
    #[error("{model} instance has no id")]
    MissingId {
        /// Model name.
        model: String,
    },

    /// The instance was removed and cannot be used again.
    #[error("{model} instance has been removed")]
    InstanceRemoved {
        /// Model name.
        model: String,
    },

    /// A lifecycle hook rejected the operation.
    #[error("hook failed: {0}")]
    Hook(String),

    /// Error reported by the datasource, passed through unchanged.
    #[error(transparent)]
    Datasource(#[from] DatasourceError),

    /// Migration sequencing error.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl Error {
    /// Convenience constructor for user hooks.
    pub fn hook(message: impl Into<String>) -> Self {
        Error::Hook(message.into())
    }

    /// Check if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Errors raised while composing a model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `extend_schema` on a model with no bound schema.
    #[error("model '{model}' does not have a schema to extend")]
    NoSchemaToExtend {
        /// Model name.
        model: String,
    },

    /// A non-object type was passed where a schema is expected.
    #[error("expected an object schema, got {kind}")]
    NotASchema {
        /// Kind of the rejected type.
        kind: String,
    },

    /// A persistence operation on a model with no datasource.
    #[error("model '{model}' has no datasource bound")]
    NoDatasource {
        /// Model name.
        model: String,
    },
}
