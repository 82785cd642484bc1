use geovc_types::ObjectId;

use crate::object::RevObjectType;

/// Errors from object model and object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The object exists but is not of the requested type.
    #[error("object {id} is a {actual}, expected {expected}")]
    WrongType {
        id: ObjectId,
        expected: RevObjectType,
        actual: RevObjectType,
    },

    /// The object data is malformed or internally inconsistent.
    #[error("corrupt object {id}: {reason}")]
    Corrupt { id: ObjectId, reason: String },

    /// Re-hashing a resolved delta tree did not reproduce its id.
    #[error("delta tree hash mismatch: expected {expected}, computed {computed}")]
    DeltaHashMismatch {
        expected: ObjectId,
        computed: ObjectId,
    },

    /// A caller supplied a malformed argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Attempted to store an object with the null id.
    #[error("cannot store object with null ID")]
    NullObjectId,

    /// Storage backend is read-only.
    #[error("store is read-only")]
    ReadOnly,

    /// Storage backend has not been opened or was closed.
    #[error("store is closed")]
    Closed,

    /// The store pool has no free slot and nothing idle to evict.
    #[error("store pool exhausted: {max_size} stores in use")]
    PoolExhausted { max_size: usize },

    /// A secondary index kept alongside the objects could not be updated.
    #[error("index update failed: {0}")]
    Index(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A lock guarding backend state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
