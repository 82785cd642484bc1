//! Error types for the diff crate.

use geovc_types::ObjectId;

/// Errors that can occur during a diff walk.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A verifying walk found a reference to an object the store lacks.
    #[error("missing object {id} referenced at {path:?}")]
    MissingObject { id: ObjectId, path: String },

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] geovc_store::StoreError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
