//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found.
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// The ref name is malformed.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A mutation was attempted through a read-only snapshot.
    #[error("cannot {operation} through a read-only ref snapshot")]
    ReadOnlySnapshot { operation: &'static str },

    /// Following symbolic refs from `name` never reached a direct ref.
    #[error("symbolic ref chain from {name} does not end in a direct ref")]
    SymbolicCycle { name: String },

    /// A lock guarding the refs was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience type alias for ref operations.
pub type RefResult<T> = std::result::Result<T, RefError>;
