use thiserror::Error;

use crate::types::Kind;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error taxonomy for the Strata storage layer.
///
/// Backend client errors pass through unwrapped inside [`GraphError::Backend`];
/// the named variants exist where the contract requires the caller to
/// distinguish the failure. No variant is retried automatically anywhere in
/// this workspace — retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A backend value could not be coerced into the requested host type.
    #[error("type mismatch: {observed} will not negotiate to {requested}")]
    TypeMismatch {
        observed: String,
        requested: &'static str,
    },

    /// A row reader was advanced past the end of its row.
    #[error("attempting to read more values than returned: row has {available} but wanted {wanted}")]
    OutOfRange { available: usize, wanted: usize },

    /// A mutation was issued before the transaction was scoped with a graph.
    #[error("operation requires a graph target to be set")]
    MissingGraphScope,

    /// Node creation was attempted without any kind.
    #[error("node creation requires at least one kind")]
    MissingKinds,

    /// A kind was used without a cached or backend-assigned identifier.
    #[error("kind {0} has no backend identifier")]
    UnresolvedKind(Kind),

    /// An index or constraint definition cannot be represented on the backend.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// A statement that must return a row (e.g. an insert returning an ID)
    /// returned none.
    #[error("expected at least one row")]
    NoRows,

    /// A named statement parameter had no bound value.
    #[error("no value bound for parameter @{0}")]
    MissingParameter(String),

    /// The requested driver name is not present in the registry.
    #[error("no driver registered under name {0:?}")]
    DriverNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// Pass-through backend client error.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl GraphError {
    /// Wrap a backend client error without translating it.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        GraphError::Backend(err.into())
    }
}
