use geovc_store::StoreError;
use geovc_types::ObjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    #[error("unexpected object type: expected tag {expected}, got {actual}")]
    UnexpectedType { expected: u8, actual: u8 },

    #[error("unknown object type tag: {0}")]
    UnknownType(u8),

    #[error("duplicate bucket index {0}")]
    DuplicateBucket(u32),

    #[error("corrupt data at offset {offset}: {reason}")]
    Corrupt { offset: usize, reason: String },

    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        expected: ObjectId,
        computed: ObjectId,
    },

    #[error("delta tree needs an object store to resolve original {0}")]
    StoreRequired(ObjectId),

    #[error("stream trailer mismatch: trailer says {expected} objects, read {actual}")]
    TrailerMismatch { expected: u64, actual: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;
