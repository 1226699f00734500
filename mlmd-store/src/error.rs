use thiserror::Error;

/// Errors returned by a [`MetadataStore`](crate::MetadataStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced type, node or database does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The entity conflicts with one that is already stored.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The request is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request is well-formed but not applicable to the current state of the store.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// The store cannot serve requests right now.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
