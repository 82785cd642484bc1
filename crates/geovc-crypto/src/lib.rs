//! Content hashing for GeoVC.
//!
//! Every revision object's identity is the SHA-1 hash of its canonical
//! encoding. [`ContentHasher`] provides domain separation per object type and
//! [`HashSink`] is the incremental funnel objects write their fields into.
//!
//! Hashing wraps the `sha1` crate; there is no custom cryptography.

pub mod hasher;

pub use hasher::{ContentHasher, HashSink};
