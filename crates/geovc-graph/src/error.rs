//! Error types for the commit graph.

use geovc_types::ObjectId;

/// Errors that can occur during commit graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A commit listed itself as one of its parents.
    #[error("commit {0} cannot be its own parent")]
    SelfParent(ObjectId),

    /// A commit was recorded again with a different parent list.
    #[error("commit {0} is already recorded with different parents")]
    ConflictingParents(ObjectId),

    /// A lock guarding the graph was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Object store operation failed.
    #[error("store error: {0}")]
    Store(#[from] geovc_store::StoreError),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
