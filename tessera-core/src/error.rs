//! Error types for the Tessera engine.
//!
//! Grouped by subsystem (catalog, write path, query, storage substrate) and
//! composed into one [`EngineError`].

use thiserror::Error;

/// Errors from the index catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Catalog CAS write lost the race after exhausting `max_retries`.
    #[error("catalog CAS conflict on collection {collection:?} after {attempts} attempt(s)")]
    Conflict { collection: String, attempts: u32 },

    /// `|indexedFields|` would exceed the blob-tag cardinality limit.
    /// This check fails immediately and is never retried.
    #[error("collection {collection:?} would exceed the {limit} indexed-field cap")]
    TagCapExceeded { collection: String, limit: usize },
}

/// Errors from document create/update/delete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("document {id:?} not found in collection {collection:?}")]
    NotFound { collection: String, id: String },

    #[error("unique constraint on field {field:?} violated in collection {collection:?}")]
    UniqueViolation { collection: String, field: String },
}

/// Errors from parsing or validating a query predicate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid query: {reason}")]
    Validation { reason: String },
}

/// Errors surfaced by an [`tessera_storage`]-style object store implementation.
///
/// Lives here (rather than in the storage crate) so that every crate in the
/// workspace can convert into the one [`EngineError`] without a dependency
/// cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("object {name:?} not found in container {container:?}")]
    NotFound { container: String, name: String },

    #[error("precondition failed writing {name:?} in container {container:?}")]
    PreconditionFailed { container: String, name: String },

    /// A transient failure from the underlying SDK. Per-hit occurrences
    /// during a listing are logged and dropped rather than propagated.
    #[error("transient storage error against {container:?}: {reason}")]
    Transient { container: String, reason: String },
}

/// Master error type for all Tessera engine operations.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("write error: {0}")]
    Write(#[from] WriteError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A value could not be tag-encoded. This is a per-field warning in the
    /// write path, not a hard failure, but is kept here so callers that want
    /// to surface it explicitly can.
    #[error("field {field:?} has no tag encoding for its value type")]
    Unsupported { field: String },
}

/// Result type alias for Tessera engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        WriteError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
        .into()
    }

    pub fn unique_violation(collection: impl Into<String>, field: impl Into<String>) -> Self {
        WriteError::UniqueViolation {
            collection: collection.into(),
            field: field.into(),
        }
        .into()
    }

    pub fn conflict(collection: impl Into<String>, attempts: u32) -> Self {
        CatalogError::Conflict {
            collection: collection.into(),
            attempts,
        }
        .into()
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        QueryError::Validation {
            reason: reason.into(),
        }
        .into()
    }
}
