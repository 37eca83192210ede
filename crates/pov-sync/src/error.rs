//! Error types for the operation layer
//!
//! Every remote-first operation reports one of five kinds of failure:
//! - unauthorized (no actor could be resolved)
//! - validation (payload or missing aggregate relation)
//! - not found (addressed entity absent)
//! - integrity violation (delete or edit would orphan a dependent)
//! - remote failure (gateway or blob storage, possibly after compensation)

use crate::gateway::Table;
use crate::guard::Dependent;
use pov_model::ValidationError;

/// Main operation-layer error
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No actor could be resolved
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Payload rejected before any remote call
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Addressed entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Change refused because dependents still reference the target
    #[error("{message}")]
    IntegrityViolation {
        message: String,
        dependents: Vec<Dependent>,
    },

    /// A remote write or read failed
    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: RemoteError,
        /// Compensations that could not be applied during rollback
        compensation_failures: Vec<String>,
    },

    /// Writes committed but the confirming read failed
    #[error("{entity} {id} was saved but could not be re-read, reload the engagement: {source}")]
    Diverged {
        entity: &'static str,
        id: String,
        #[source]
        source: GatewayError,
    },
}

impl SyncError {
    /// Not-found error for an entity kind and id
    #[inline]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Remote failure without compensation history
    #[inline]
    pub fn remote(context: impl Into<String>, source: impl Into<RemoteError>) -> Self {
        Self::Remote {
            context: context.into(),
            source: source.into(),
            compensation_failures: Vec::new(),
        }
    }

    /// Check if the caller can retry unchanged
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote { source, .. } => source.is_retryable(),
            Self::Diverged { .. } => true,
            _ => false,
        }
    }

    /// Check if the failure is caused by the submitted input or the actor
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_)
                | Self::Validation(_)
                | Self::NotFound { .. }
                | Self::IntegrityViolation { .. }
        )
    }

    /// Message suitable for the failed lifecycle event
    ///
    /// User errors carry their own explanation; remote failures fall back
    /// to the operation's default message.
    #[must_use]
    pub fn user_message(&self, default: &str) -> String {
        if self.is_user_error() {
            self.to_string()
        } else {
            default.to_string()
        }
    }
}

/// Failure of a remote port
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RemoteError {
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(e) => e.is_retryable(),
            Self::Storage(e) => matches!(e, StorageError::Transport(_)),
        }
    }
}

/// Row-level gateway errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Unique constraint violated
    #[error("duplicate key on {table} ({columns})")]
    Constraint { table: Table, columns: String },

    /// Referenced parent row does not exist
    #[error("foreign key {table}.{column} references missing row {value}")]
    ForeignKey {
        table: Table,
        column: String,
        value: String,
    },

    /// Expected row is absent
    #[error("no matching row in {table}")]
    NotFound { table: Table },

    /// Connection or backend failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Row could not be encoded or decoded
    #[error("row serialization failed for {table}: {message}")]
    Serialization { table: Table, message: String },
}

impl GatewayError {
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    #[inline]
    pub(crate) fn serialization(table: Table, err: &serde_json::Error) -> Self {
        Self::Serialization {
            table,
            message: err.to_string(),
        }
    }
}

/// Blob storage errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },

    #[error("storage transport error: {0}")]
    Transport(String),
}

/// Identity provider failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("identity provider error: {0}")]
pub struct IdentityError(pub String);

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Result alias for operation-layer calls
pub type SyncResult<T> = Result<T, SyncError>;
